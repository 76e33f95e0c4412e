//! # HTML Reporting Module / HTML 报告模块
//!
//! Renders a self-contained HTML page with the outcome counts and one row per
//! sub-test. Diagnostics of non-passing rows are folded behind a toggle.
//!
//! 生成一个独立的 HTML 页面，包含结果统计和每个子测试一行。未通过行的诊断信息可折叠显示。

use anyhow::{Context, Result};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::fs;
use std::path::Path;

use crate::core::items::Submission;
use crate::core::models::{OutcomeKind, SubTestReport};
use crate::infra::t;
use crate::reporting::console::status_label;

/// Embedded CSS styles for HTML reports / HTML 报告的嵌入式 CSS 样式
const HTML_STYLE: &str = include_str!("assets/report.css");

/// Embedded JavaScript for HTML report interactivity / HTML 报告交互性的嵌入式 JavaScript
const HTML_SCRIPT: &str = include_str!("assets/report.js");

/// Renders the report page.
///
/// 渲染报告页面。
pub fn render_html_report(
    reports: &[SubTestReport],
    submission: &Submission,
    cohort: Option<&str>,
    locale: &str,
) -> Markup {
    let total = reports.len();
    let passed = reports.iter().filter(|r| r.outcome.is_pass()).count();
    let environment = reports
        .iter()
        .filter(|r| {
            matches!(
                r.outcome,
                OutcomeKind::ToolchainUnavailable | OutcomeKind::ConfigError
            )
        })
        .count();
    let failed = total - passed - environment;

    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (t!("html_report.title", locale = locale)) }
                style { (PreEscaped(HTML_STYLE)) }
            }
            body {
                h1 { (t!("html_report.main_header", locale = locale)) }
                div class="meta" {
                    (t!("html_report.student", locale = locale)) ": " (submission.student)
                    @if let Some(cohort) = cohort {
                        " · " (t!("html_report.cohort", locale = locale)) ": " (cohort)
                    }
                }
                div class="summary-container" {
                    (summary_item(total, "", &t!("html_report.summary.total", locale = locale)))
                    (summary_item(passed, "passed-text", &t!("html_report.summary.passed", locale = locale)))
                    (summary_item(failed, "failed-text", &t!("html_report.summary.failed", locale = locale)))
                    (summary_item(environment, "environment-text", &t!("html_report.summary.environment", locale = locale)))
                }
                table {
                    thead {
                        tr {
                            th { (t!("html_report.table.header.name", locale = locale)) }
                            th { (t!("html_report.table.header.file", locale = locale)) }
                            th class="line-cell" { (t!("html_report.table.header.line", locale = locale)) }
                            th { (t!("html_report.table.header.status", locale = locale)) }
                            th class="duration-cell" { (t!("html_report.table.header.duration", locale = locale)) }
                        }
                    }
                    tbody {
                        @for (i, report) in reports.iter().enumerate() {
                            @let output_id = format!("output-{i}");
                            tr {
                                td { (report.name) }
                                td { (report.file.display().to_string()) }
                                td class="line-cell" { (report.line) }
                                td {
                                    div class={ "status-cell " (report.outcome.css_class()) } {
                                        (status_label(report.outcome, locale))
                                    }
                                    @if !report.outcome.is_pass() {
                                        div class="output-toggle" onclick={ "toggleOutput('" (output_id) "')" } {
                                            (t!("html_report.toggle_output", locale = locale))
                                        }
                                    }
                                }
                                td class="duration-cell" { (format!("{:.2}s", report.elapsed.as_secs_f64())) }
                            }
                            @if !report.outcome.is_pass() {
                                tr id=(output_id) style="display:none;" {
                                    td colspan="5" {
                                        pre class="output-content" { (report.diagnostic) }
                                    }
                                }
                            }
                        }
                    }
                }
                script { (PreEscaped(HTML_SCRIPT)) }
            }
        }
    }
}

fn summary_item(count: usize, class: &str, label: &str) -> Markup {
    html! {
        div class="summary-item" {
            span class={ "count " (class) } { (count) }
            span class="label" { (label) }
        }
    }
}

/// Writes the report page to `output_path`.
///
/// 将报告页面写入 `output_path`。
pub fn generate_html_report(
    reports: &[SubTestReport],
    submission: &Submission,
    cohort: Option<&str>,
    output_path: &Path,
    locale: &str,
) -> Result<()> {
    let page = render_html_report(reports, submission, cohort, locale);
    fs::write(output_path, page.into_string())
        .with_context(|| format!("Failed to write HTML report: {}", output_path.display()))?;
    Ok(())
}
