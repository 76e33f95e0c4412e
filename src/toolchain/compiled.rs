//! Compiled toolchain: the test specification file is itself a C translation
//! unit that includes the student's code through a generated `student.h`,
//! linked with instructor mocks into one test binary.
//!
//! 编译型工具链：测试规范文件本身就是一个 C 编译单元，
//! 通过生成的 `student.h` 包含学生代码，并与教师提供的模拟实现链接为测试二进制文件。

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

use super::{
    ArtifactKind, BuildArtifact, BuildFailure, Built, ExecContext, LintFailure, LintReport,
    RunFailure, RunObservation, Verdict, build_step, lint_step, run_step, student_sources,
};
use crate::core::config::EffectiveConfig;
use crate::core::directive::SubTestDeclaration;
use crate::infra::command::Invocation;

const BINARY_NAME: &str = "test_binary";
const STUDENT_HEADER: &str = "student.h";
const DEFAULT_CHECKS: &str = "performance-*,readability-*,portability-*";

static WARNINGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s+warnings?\s+generated").expect("static regex"));

/// Contents of the generated header that pulls the student's sources into the
/// test translation unit.
pub fn student_header(sources: &[PathBuf]) -> String {
    let mut header = String::from("#ifndef AUTOMARK_STUDENT_H\n#define AUTOMARK_STUDENT_H\n");
    for source in sources {
        header.push_str(&format!("#include \"{}\"\n", source.display()));
    }
    header.push_str("#endif\n");
    header
}

fn include_flags(ctx: &ExecContext<'_>, cfg: &EffectiveConfig, build_dir: Option<&Path>) -> Vec<String> {
    let mut dirs = vec![ctx.test_dir()];
    dirs.extend(build_dir.map(Path::to_path_buf));
    dirs.push(ctx.submission.root.clone());
    dirs.extend(cfg.build.include.iter().cloned());
    dirs.iter().map(|d| format!("-I{}", d.display())).collect()
}

fn define_flags(cfg: &EffectiveConfig) -> impl Iterator<Item = String> + '_ {
    cfg.build.defines.iter().map(|d| {
        if d.starts_with("-D") {
            d.clone()
        } else {
            format!("-D{d}")
        }
    })
}

pub(super) async fn build(
    ctx: &ExecContext<'_>,
    cfg: &EffectiveConfig,
    build_dir: &Path,
) -> Result<Built, BuildFailure> {
    let compiler = ctx
        .tool("COMPILER")
        .map_err(|tool| BuildFailure::Unavailable { tool })?;
    let sources = student_sources(ctx.submission, &cfg.build.sources, &["c"]).map_err(|log| {
        BuildFailure::Diagnostics {
            log,
            exit_code: None,
        }
    })?;
    std::fs::write(build_dir.join(STUDENT_HEADER), student_header(&sources))
        .map_err(|e| BuildFailure::Environment(format!("cannot write {STUDENT_HEADER}: {e}")))?;

    let test_dir = ctx.test_dir();
    let binary = build_dir.join(BINARY_NAME);
    let invocation = Invocation::new(compiler)
        .args(&cfg.build.cflags)
        .args(define_flags(cfg))
        .args(include_flags(ctx, cfg, Some(build_dir)))
        .arg(&ctx.spec.path)
        .args(cfg.build.mocks.iter().map(|m| test_dir.join(m)))
        .arg("-o")
        .arg(&binary)
        .args(&cfg.build.ldflags)
        .current_dir(build_dir);

    let mut log = String::new();
    build_step(
        ctx.invoke(&invocation, cfg.limits.build_timeout, cfg).await,
        &mut log,
    )?;
    Ok(Built {
        kind: ArtifactKind::Binary(binary),
        log,
    })
}

/// Reads the warning count out of the linter's diagnostics: the sum over every
/// translation unit clang-tidy reports on.
pub fn warning_count(output: &str) -> u64 {
    WARNINGS
        .captures_iter(output)
        .filter_map(|c| c[1].parse::<u64>().ok())
        .sum()
}

pub(super) async fn lint(
    ctx: &ExecContext<'_>,
    cfg: &EffectiveConfig,
) -> Result<LintReport, LintFailure> {
    let linter = ctx
        .tool("LINTER")
        .map_err(|tool| LintFailure::Unavailable { tool })?;
    let sources = match student_sources(ctx.submission, &cfg.build.sources, &["c"]) {
        Ok(sources) if !sources.is_empty() => sources,
        // Nothing of the student's to lint; the build reports missing files.
        _ => return Ok(LintReport::skipped()),
    };
    let checks = if cfg.lint.checks.is_empty() {
        DEFAULT_CHECKS.to_string()
    } else {
        cfg.lint.checks.join(",")
    };

    let mut output = String::new();
    let mut warnings = 0;
    for source in &sources {
        let invocation = Invocation::new(linter)
            .arg(source)
            .arg(format!("-checks={checks}"))
            .arg("--quiet")
            .arg("--")
            .args(&cfg.build.cflags)
            .args(define_flags(cfg))
            .args(include_flags(ctx, cfg, None))
            .current_dir(&ctx.submission.root);
        let raw = lint_step(ctx.invoke(&invocation, cfg.limits.lint_timeout, cfg).await)?;
        output.push_str(&raw.combined_output());
        if !raw.success() {
            return Err(LintFailure::ToolFailed { output });
        }
        warnings += warning_count(&raw.stderr);
    }

    if warnings > cfg.lint.max_warnings {
        return Err(LintFailure::Violations {
            detail: format!(
                "{warnings} lint warnings exceed the limit of {}",
                cfg.lint.max_warnings
            ),
            output,
        });
    }
    Ok(LintReport {
        output,
        warnings: Some(warnings),
        score: None,
        skipped: false,
    })
}

pub(super) async fn run(
    ctx: &ExecContext<'_>,
    artifact: &BuildArtifact,
    decl: &SubTestDeclaration,
    cfg: &EffectiveConfig,
) -> Result<RunObservation, RunFailure> {
    let ArtifactKind::Binary(binary) = &artifact.kind else {
        return Err(RunFailure::Spawn("artifact is not a test binary".to_string()));
    };
    let args = if cfg.run.args.is_empty() {
        vec![decl.name.clone()]
    } else {
        cfg.run.args.clone()
    };
    let invocation = Invocation::new(binary)
        .args(&args)
        .stdin(cfg.run.input.clone().or_else(|| decl.body_text()))
        .current_dir(artifact.dir());
    let raw = run_step(ctx.invoke(&invocation, cfg.limits.timeout, cfg).await)?;
    Ok(RunObservation {
        observed: raw.stdout.clone(),
        raw,
        verdict: Verdict::Normal,
    })
}
