//! # Console Reporting Module / 控制台报告模块
//!
//! Prints the summary table and the diagnostics of every sub-test that did not
//! pass, with localised labels.
//!
//! 打印摘要表格以及每个未通过子测试的诊断信息，标签已本地化。

use colored::*;

use crate::core::models::{OutcomeKind, SubTestReport};
use crate::infra::t;

/// Gets the localised status label of an outcome.
/// 获取结果的本地化状态标签。
pub fn status_label(kind: OutcomeKind, locale: &str) -> String {
    match kind {
        OutcomeKind::Pass => t!("status.pass", locale = locale),
        OutcomeKind::Fail => t!("status.fail", locale = locale),
        OutcomeKind::CompileError => t!("status.compile_error", locale = locale),
        OutcomeKind::LintError => t!("status.lint_error", locale = locale),
        OutcomeKind::Timeout => t!("status.timeout", locale = locale),
        OutcomeKind::RuntimeError => t!("status.runtime_error", locale = locale),
        OutcomeKind::ToolchainUnavailable => t!("status.toolchain_unavailable", locale = locale),
        OutcomeKind::ConfigError => t!("status.config_error", locale = locale),
    }
    .to_string()
}

/// Colors a status label by outcome.
fn paint(kind: OutcomeKind, label: &str) -> ColoredString {
    match kind {
        OutcomeKind::Pass => label.green(),
        OutcomeKind::Fail | OutcomeKind::Timeout => label.red(),
        OutcomeKind::ToolchainUnavailable | OutcomeKind::ConfigError => label.yellow(),
        _ => label.magenta(),
    }
}

/// Prints a formatted summary of the reports.
///
/// 打印报告的格式化摘要。
///
/// # Output Format / 输出格式
/// ```text
/// --- Sub-test Summary ---
///   - Pass                 | adder.c::adds_small                     |      0.02s
///   - Timeout              | adder.c::loops                          |      1.00s
/// ```
pub fn print_summary(reports: &[SubTestReport], locale: &str) {
    println!("\n{}", t!("summary_banner", locale = locale).bold());

    for report in reports {
        let label = status_label(report.outcome, locale);
        let name = format!(
            "{}::{}",
            report
                .file
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default(),
            report.name
        );
        println!(
            "  - {:<22} | {:<40} | {:>10}",
            paint(report.outcome, &label),
            name,
            format!("{:.2}s", report.elapsed.as_secs_f64())
        );
    }

    let passed = reports.iter().filter(|r| r.outcome.is_pass()).count();
    println!(
        "\n{}",
        t!(
            "summary_totals",
            locale = locale,
            passed = passed,
            total = reports.len()
        )
    );
}

/// Prints the diagnostic of each report that did not pass. Prints nothing when
/// every report passed.
///
/// 打印每个未通过报告的诊断信息。全部通过时不打印任何内容。
pub fn print_failure_details(reports: &[SubTestReport], locale: &str) {
    let failures: Vec<&SubTestReport> = reports.iter().filter(|r| !r.outcome.is_pass()).collect();
    if failures.is_empty() {
        return;
    }

    println!("\n{}", t!("failure_banner", locale = locale).red().bold());
    println!("{}", "-".repeat(80));

    for (i, report) in failures.iter().enumerate() {
        let label = status_label(report.outcome, locale);
        println!(
            "[{}/{}] {} '{}' ({}:{})",
            i + 1,
            failures.len(),
            paint(report.outcome, &label),
            report.name.cyan(),
            report.file.display(),
            report.line
        );
        if let Some(code) = report.exit_code {
            println!("{}", t!("exit_code_line", locale = locale, code = code));
        }
        println!("\n--- {} ---\n", t!("diagnostic_header", locale = locale).yellow());
        println!("{}", report.diagnostic);
        println!("\n{}", "-".repeat(80));
    }
}
