//! Scripting toolchain: the student's Python module is syntax-checked at build
//! time, then loaded under a private name by a small harness that calls the
//! requested entry point and reports its return value.
//!
//! 脚本工具链：构建时检查学生 Python 模块的语法，运行时由一个小型引导程序以私有名称加载模块，
//! 调用指定的入口函数并报告其返回值。

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

use super::{
    ArtifactKind, BuildArtifact, BuildFailure, Built, ExecContext, LintFailure, LintReport,
    RunFailure, RunObservation, Verdict, build_step, lint_step, run_step,
};
use crate::core::config::EffectiveConfig;
use crate::core::directive::SubTestDeclaration;
use crate::infra::command::Invocation;

/// Prefix of the line carrying the entry point's return value.
pub const RESULT_SENTINEL: &str = "@@automark-result@@ ";

/// Score required when linting is on but no `LINT_THRESHOLD` is given.
const DEFAULT_THRESHOLD: f64 = 10.0;

const PYLINT_FATAL: i32 = 1;
const PYLINT_USAGE_ERROR: i32 = 32;

static SCORE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"rated at (-?\d+(?:\.\d+)?)/10").expect("static regex"));

/// Loads the module from its path under a private name (so it cannot shadow or
/// be shadowed by an installed package), calls the entry point with the
/// literal-evaluated arguments and prints the sentinel line.
const HARNESS: &str = r#"import ast, importlib.util, os, sys
path, name, entry = sys.argv[1], sys.argv[2], sys.argv[3]
def value(text):
    try:
        return ast.literal_eval(text)
    except (ValueError, SyntaxError):
        return text
sys.path.insert(0, os.path.dirname(os.path.abspath(path)))
spec = importlib.util.spec_from_file_location("_automark_" + name, path)
module = importlib.util.module_from_spec(spec)
spec.loader.exec_module(module)
if not hasattr(module, entry):
    sys.stderr.write("AttributeError: module '%s' has no attribute '%s'\n" % (name, entry))
    sys.exit(1)
result = getattr(module, entry)(*[value(a) for a in sys.argv[4:]])
sys.stdout.write("\n@@automark-result@@ " + str(result) + "\n")
sys.stdout.flush()
"#;

/// Runs the module as `__main__` with its own directory first on `sys.path`,
/// as a plain `python3 module.py` would.
const SCRIPT_HARNESS: &str = r#"import os, runpy, sys
path = sys.argv[1]
sys.argv = sys.argv[1:]
sys.path.insert(0, os.path.dirname(os.path.abspath(path)))
runpy.run_path(path, run_name="__main__")
"#;

fn module_path(root: &Path, module: &str) -> PathBuf {
    if module.ends_with(".py") {
        root.join(module)
    } else {
        root.join(format!("{}.py", module.replace('.', "/")))
    }
}

fn module_name(cfg: &EffectiveConfig) -> &str {
    cfg.build.module.as_deref().unwrap_or_default()
}

pub(super) async fn build(
    ctx: &ExecContext<'_>,
    cfg: &EffectiveConfig,
    build_dir: &Path,
) -> Result<Built, BuildFailure> {
    let interpreter = ctx
        .tool("INTERPRETER")
        .map_err(|tool| BuildFailure::Unavailable { tool })?;
    let name = module_name(cfg);
    let path = module_path(&ctx.submission.root, name);
    if !path.is_file() {
        return Err(BuildFailure::Diagnostics {
            log: format!("missing student module: {}", path.display()),
            exit_code: None,
        });
    }

    // Bytecode goes to the build directory, never into the submission.
    let invocation = Invocation::new(interpreter)
        .arg("-X")
        .arg(format!("pycache_prefix={}", build_dir.display()))
        .arg("-m")
        .arg("py_compile")
        .arg(&path)
        .current_dir(build_dir);
    let mut log = String::new();
    build_step(
        ctx.invoke(&invocation, cfg.limits.build_timeout, cfg).await,
        &mut log,
    )?;
    Ok(Built {
        kind: ArtifactKind::Module {
            path,
            name: name.to_string(),
        },
        log,
    })
}

/// Reads the score out of pylint's report.
pub fn lint_score(output: &str) -> Option<f64> {
    SCORE
        .captures_iter(output)
        .last()
        .and_then(|c| c[1].parse().ok())
}

pub(super) async fn lint(
    ctx: &ExecContext<'_>,
    cfg: &EffectiveConfig,
) -> Result<LintReport, LintFailure> {
    let linter = ctx
        .tool("LINTER")
        .map_err(|tool| LintFailure::Unavailable { tool })?;
    let path = module_path(&ctx.submission.root, module_name(cfg));
    let mut invocation = Invocation::new(linter)
        .arg("--output-format=text")
        .arg("--score=y");
    if !cfg.lint.checks.is_empty() {
        invocation = invocation
            .arg("--disable=all")
            .arg(format!("--enable={}", cfg.lint.checks.join(",")));
    }
    let invocation = invocation.arg(&path).current_dir(&ctx.submission.root);

    let raw = lint_step(ctx.invoke(&invocation, cfg.limits.lint_timeout, cfg).await)?;
    let output = raw.combined_output();
    let status = raw.exit_code.unwrap_or(PYLINT_USAGE_ERROR);
    if status & PYLINT_USAGE_ERROR != 0 || raw.exit_code.is_none() {
        return Err(LintFailure::ToolFailed { output });
    }
    if status & PYLINT_FATAL != 0 {
        return Err(LintFailure::Violations {
            detail: "the linter reported a fatal message".to_string(),
            output,
        });
    }

    let threshold = cfg.lint.threshold.unwrap_or(DEFAULT_THRESHOLD);
    let score = lint_score(&output);
    if let Some(score) = score {
        if score < threshold {
            return Err(LintFailure::Violations {
                detail: format!("Code Rating of {score:.2} lower than {threshold:.2}"),
                output,
            });
        }
    }
    Ok(LintReport {
        output,
        warnings: None,
        score,
        skipped: false,
    })
}

/// Splits the sentinel line off the captured stdout. Returns the remaining
/// stdout and the reported value.
///
/// The harness writes a newline before the sentinel so that it always starts a
/// line; that newline is dropped again here.
pub fn split_result(stdout: &str) -> (String, Option<String>) {
    let mut value = None;
    let mut rest = String::with_capacity(stdout.len());
    for line in stdout.split_inclusive('\n') {
        match line.strip_prefix(RESULT_SENTINEL) {
            Some(reported) => {
                if rest.ends_with('\n') {
                    rest.pop();
                }
                value = Some(reported.trim_end_matches(['\n', '\r']).to_string());
            }
            None => rest.push_str(line),
        }
    }
    (rest, value)
}

pub(super) async fn run(
    ctx: &ExecContext<'_>,
    artifact: &BuildArtifact,
    decl: &SubTestDeclaration,
    cfg: &EffectiveConfig,
) -> Result<RunObservation, RunFailure> {
    let interpreter = ctx
        .tool("INTERPRETER")
        .map_err(|tool| RunFailure::Unavailable { tool })?;
    let ArtifactKind::Module { path, name } = &artifact.kind else {
        return Err(RunFailure::Spawn("artifact is not a module".to_string()));
    };

    let invocation = match &cfg.run.entry {
        Some(entry) => Invocation::new(interpreter)
            .args(["-I", "-B", "-c", HARNESS])
            .arg(path)
            .arg(name)
            .arg(entry),
        None => Invocation::new(interpreter)
            .args(["-I", "-B", "-c", SCRIPT_HARNESS])
            .arg(path),
    }
    .args(&cfg.run.args)
    .stdin(cfg.run.input.clone().or_else(|| decl.body_text()))
    .current_dir(&ctx.submission.root);

    let mut raw = run_step(ctx.invoke(&invocation, cfg.limits.timeout, cfg).await)?;
    let observed = if cfg.run.entry.is_some() {
        let (rest, value) = split_result(&raw.stdout);
        raw.stdout = rest;
        value.unwrap_or_else(|| raw.stdout.clone())
    } else {
        raw.stdout.clone()
    };
    Ok(RunObservation {
        raw,
        observed,
        verdict: Verdict::Normal,
    })
}
