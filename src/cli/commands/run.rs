//! # Run Command Module / 运行命令模块
//!
//! Collects every given file, executes all sub-tests against one submission in
//! parallel and prints the summary. Fails when any sub-test did not pass or any
//! file could not be collected.
//!
//! 收集所有给定文件，针对一份提交并行执行全部子测试并打印摘要。任何子测试未通过时返回失败。

use anyhow::{Context, Result};
use colored::*;
use std::{fs, path::PathBuf, sync::Arc};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    core::{
        engine::{self, Engine},
        items::Submission,
    },
    infra::t,
    reporting::{generate_html_report, print_failure_details, print_summary, write_json_report},
};

/// Arguments of the `run` subcommand.
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub files: Vec<PathBuf>,
    pub submission: PathBuf,
    pub student: Option<String>,
    pub config: Option<PathBuf>,
    pub overrides: Vec<String>,
    pub jobs: Option<usize>,
    pub html: Option<PathBuf>,
    pub json: Option<PathBuf>,
}

pub async fn execute(args: RunArgs, locale: &str) -> Result<()> {
    let root = fs::canonicalize(&args.submission).with_context(|| {
        t!(
            "submission_not_found",
            locale = locale,
            path = args.submission.display()
        )
    })?;
    let student = args.student.clone().unwrap_or_else(|| {
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    let store = super::load_store(args.config.clone(), &args.overrides, locale)?;
    let cohort = store.cohort_name.clone();
    let submission = Submission::new(student, root);

    println!(
        "{}",
        t!(
            "grading_submission",
            locale = locale,
            student = submission.student.yellow(),
            path = submission.root.display()
        )
    );

    let engine = Arc::new(Engine::new(store, submission.clone()));
    let mut items = Vec::new();
    let mut skipped = 0;
    for path in &args.files {
        let collected = match engine.collect(path) {
            Ok(collected) => collected,
            Err(e) => {
                eprintln!("{} {e}", t!("collect_failed", locale = locale).red());
                skipped += 1;
                continue;
            }
        };
        if collected.is_empty() {
            println!(
                "{}",
                t!("no_subtests_in_file", locale = locale, path = path.display()).yellow()
            );
        }
        items.extend(collected.items);
    }

    if items.is_empty() {
        if skipped > 0 {
            anyhow::bail!(t!("files_skipped", locale = locale, count = skipped));
        }
        println!("{}", t!("no_subtests", locale = locale).green());
        return Ok(());
    }

    let jobs = args.jobs.unwrap_or_else(engine::default_jobs);
    println!(
        "{}",
        t!("running_subtests", locale = locale, count = items.len(), jobs = jobs).bold()
    );

    let stop_token = setup_signal_handler(locale);
    let summary = engine.execute_all(items, jobs, &stop_token).await;

    print_summary(&summary.reports, locale);

    if let Some(report_path) = &args.html {
        println!(
            "\n{}",
            t!("generating_html", locale = locale, path = report_path.display())
        );
        if let Err(e) = generate_html_report(
            &summary.reports,
            &submission,
            cohort.as_deref(),
            report_path,
            locale,
        ) {
            eprintln!("{} {e:#}", t!("report_failed", locale = locale).red());
        }
    }
    if let Some(report_path) = &args.json {
        if let Err(e) = write_json_report(&summary.reports, &submission, cohort.as_deref(), report_path) {
            eprintln!("{} {e:#}", t!("report_failed", locale = locale).red());
        }
    }

    if summary.cancelled > 0 {
        anyhow::bail!(t!("run_cancelled", locale = locale, count = summary.cancelled));
    }
    if !summary.all_passed() {
        print_failure_details(&summary.reports, locale);
        anyhow::bail!(t!(
            "subtests_failed",
            locale = locale,
            failed = summary.reports.len() - summary.passed(),
            total = summary.reports.len()
        ));
    }
    if skipped > 0 {
        anyhow::bail!(t!("files_skipped", locale = locale, count = skipped));
    }
    println!("\n{}", t!("all_passed", locale = locale).green().bold());
    Ok(())
}

/// Cancels the returned token on Ctrl-C. In-flight processes are killed by the
/// engine once the token fires.
fn setup_signal_handler(locale: &str) -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();
    let locale = locale.to_string();

    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                println!("\n{}", t!("shutdown_signal", locale = &locale).yellow());
                token_clone.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    token
}
