//! # Result Classification Module / 结果分类模块
//!
//! Maps every failure and every finished run onto exactly one [`OutcomeKind`].
//! The engine calls these in pipeline order (config, tool availability, build,
//! lint, run), so the first failing stage decides the outcome.
//!
//! 将每种失败和每次完成的运行映射为唯一的 [`OutcomeKind`]。
//! 引擎按管道顺序调用这些函数，因此第一个失败的阶段决定结果。

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::config::{CompareMode, ConfigError, EffectiveConfig};
use crate::core::engine::Cancelled;
use crate::core::models::{ExecutionOutcome, OutcomeKind};
use crate::infra::command::cap_text;
use crate::toolchain::{BuildFailure, LintFailure, RunFailure, RunObservation, Verdict};

static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?").expect("static regex")
});

/// Every number in `text`, in order of appearance.
pub fn extract_numbers(text: &str) -> Vec<f64> {
    NUMBER
        .find_iter(text)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

fn normalise(text: &str) -> String {
    text.replace("\r\n", "\n").trim().to_string()
}

fn mismatch(expected: &str, observed: &str) -> String {
    format!("expected:\n{expected}\nactual:\n{observed}")
}

/// Compares an observed value with the expectation. `Err` carries the
/// mismatch diagnostic.
///
/// 将观察值与期望值比较。`Err` 携带不匹配的诊断信息。
pub fn compare(
    mode: CompareMode,
    expected: &str,
    observed: &str,
    epsilon: f64,
) -> Result<(), String> {
    let observed = normalise(observed);
    match mode {
        CompareMode::Exact => {
            let expected = normalise(expected);
            if expected == observed {
                Ok(())
            } else {
                Err(mismatch(&expected, &observed))
            }
        }
        CompareMode::Contains => {
            if observed.contains(&normalise(expected)) {
                Ok(())
            } else {
                Err(mismatch(expected, &observed))
            }
        }
        CompareMode::Regex => {
            let pattern = Regex::new(expected).map_err(|e| e.to_string())?;
            if pattern.is_match(&observed) {
                Ok(())
            } else {
                Err(format!("output does not match /{expected}/\nactual:\n{observed}"))
            }
        }
        CompareMode::Numeric => {
            let want = extract_numbers(expected);
            let got = extract_numbers(&observed);
            // Numbers after the expected ones are not compared.
            if got.len() < want.len() {
                return Err(format!(
                    "expected {} number(s), found {}\n{}",
                    want.len(),
                    got.len(),
                    mismatch(expected, &observed)
                ));
            }
            for (index, (w, g)) in want.iter().zip(&got).enumerate() {
                // NaN never lies within the tolerance.
                let within = (w - g).abs() <= epsilon;
                if !within {
                    return Err(format!(
                        "value {}: expected {w}, got {g} (tolerance {epsilon})\n{}",
                        index + 1,
                        mismatch(expected, &observed)
                    ));
                }
            }
            Ok(())
        }
    }
}

pub fn config_error(error: &ConfigError) -> ExecutionOutcome {
    ExecutionOutcome::new(OutcomeKind::ConfigError, error.to_string())
}

pub fn unavailable(tool: &str) -> ExecutionOutcome {
    ExecutionOutcome::new(
        OutcomeKind::ToolchainUnavailable,
        format!("required executable not found: {tool}"),
    )
}

pub fn build_failure(failure: &BuildFailure) -> Result<ExecutionOutcome, Cancelled> {
    Ok(match failure {
        BuildFailure::Unavailable { tool } => unavailable(tool),
        BuildFailure::Environment(reason) => {
            ExecutionOutcome::new(OutcomeKind::ToolchainUnavailable, reason.clone())
        }
        BuildFailure::Diagnostics { log, exit_code } => {
            ExecutionOutcome::new(OutcomeKind::CompileError, log.clone()).with_exit_code(*exit_code)
        }
        BuildFailure::TimedOut { log } => ExecutionOutcome::new(
            OutcomeKind::Timeout,
            format!("build timed out\n{log}"),
        ),
        BuildFailure::Cancelled => return Err(Cancelled),
    })
}

pub fn lint_failure(failure: &LintFailure) -> Result<ExecutionOutcome, Cancelled> {
    Ok(match failure {
        LintFailure::Unavailable { tool } => unavailable(tool),
        LintFailure::Violations { output, detail } => {
            ExecutionOutcome::new(OutcomeKind::LintError, format!("{detail}\n{output}"))
        }
        LintFailure::ToolFailed { output } => {
            ExecutionOutcome::new(OutcomeKind::CompileError, output.clone())
        }
        LintFailure::TimedOut { output } => {
            ExecutionOutcome::new(OutcomeKind::Timeout, format!("lint timed out\n{output}"))
        }
        LintFailure::Cancelled => return Err(Cancelled),
    })
}

pub fn run_failure(failure: &RunFailure) -> Result<ExecutionOutcome, Cancelled> {
    Ok(match failure {
        RunFailure::Unavailable { tool } => unavailable(tool),
        RunFailure::Spawn(reason) => ExecutionOutcome::new(OutcomeKind::RuntimeError, reason.clone()),
        RunFailure::Cancelled => return Err(Cancelled),
    })
}

fn describe_exit(code: Option<i32>, signal: Option<i32>) -> String {
    match (code, signal) {
        (_, Some(signal)) => format!("terminated by signal {signal}"),
        (Some(code), None) => format!("exit status {code}"),
        (None, None) => "no exit status".to_string(),
    }
}

/// Classifies a finished run: timeout, then assertion verdicts, then exit
/// status, then the value comparison.
///
/// 对完成的运行进行分类：先超时，再断言结论，再退出状态，最后是值比较。
pub fn run_outcome(observation: &RunObservation, cfg: &EffectiveConfig) -> ExecutionOutcome {
    let raw = &observation.raw;
    let output = raw.combined_output();
    let cap = cfg.limits.output_cap;
    let outcome = |kind: OutcomeKind, diagnostic: String| {
        ExecutionOutcome::new(kind, cap_text(&diagnostic, cap))
            .with_elapsed(raw.elapsed)
            .with_exit_code(raw.exit_code)
    };

    if raw.timed_out {
        let bound = cfg
            .limits
            .timeout
            .map(|t| format!("{:.2}s", t.as_secs_f64()))
            .unwrap_or_else(|| "its limit".to_string());
        return outcome(
            OutcomeKind::Timeout,
            format!("run timed out after {bound}\n{output}"),
        );
    }

    if let Verdict::AssertionFailed { detail } = &observation.verdict {
        return outcome(OutcomeKind::Fail, format!("{detail}\n{output}"));
    }

    if raw.signal.is_some() || raw.exit_code != Some(cfg.run.exit_code) {
        let kind = if cfg.run.assert_exit {
            OutcomeKind::Fail
        } else {
            OutcomeKind::RuntimeError
        };
        return outcome(
            kind,
            format!(
                "{} (expected exit status {})\n{output}",
                describe_exit(raw.exit_code, raw.signal),
                cfg.run.exit_code
            ),
        );
    }

    if let Some(expected) = &cfg.run.expect {
        if let Err(diff) = compare(
            cfg.run.compare,
            expected,
            &observation.observed,
            cfg.run.epsilon,
        ) {
            return outcome(OutcomeKind::Fail, diff);
        }
    }
    outcome(OutcomeKind::Pass, output)
}
