//! # Toolchain Adapters / 工具链适配器
//!
//! The three toolchains share one capability set: `build`, `lint` and `run`.
//! [`Toolchain`] is a tagged variant selected by the file's [`ToolchainKind`];
//! the variant-specific steps live in [`compiled`], [`script`] and [`hdl`].
//! All external programs are started through [`crate::infra::command::run`].
//!
//! 三个工具链共享同一组能力：`build`、`lint` 和 `run`。
//! [`Toolchain`] 是按文件的 [`ToolchainKind`] 选择的标签变体。

pub mod compiled;
pub mod hdl;
pub mod script;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::config::EffectiveConfig;
use crate::core::directive::SubTestDeclaration;
use crate::core::items::{Submission, TestSpecFile};
use crate::core::models::{BuildContext, ToolchainKind};
use crate::infra::command::{self, Invocation, RawRunResult, SpawnError, cap_text};
use crate::infra::fs;

/// An executable a sub-test needs, named by its configuration key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRequirement {
    pub key: &'static str,
    pub name: String,
}

/// Executables located on this machine, by configuration key.
#[derive(Debug, Clone, Default)]
pub struct ResolvedTools {
    paths: BTreeMap<&'static str, PathBuf>,
}

impl ResolvedTools {
    pub fn insert(&mut self, key: &'static str, path: PathBuf) {
        self.paths.insert(key, path);
    }

    pub fn get(&self, key: &str) -> Option<&Path> {
        self.paths.get(key).map(PathBuf::as_path)
    }
}

/// What an adapter step may look at.
pub struct ExecContext<'a> {
    pub spec: &'a TestSpecFile,
    pub submission: &'a Submission,
    pub tools: &'a ResolvedTools,
    pub cancel: &'a CancellationToken,
}

impl ExecContext<'_> {
    /// Directory holding the test specification file.
    pub fn test_dir(&self) -> PathBuf {
        self.spec
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn tool(&self, key: &'static str) -> Result<&Path, String> {
        self.tools.get(key).ok_or_else(|| key.to_ascii_lowercase())
    }

    async fn invoke(
        &self,
        invocation: &Invocation,
        timeout: Option<Duration>,
        cfg: &EffectiveConfig,
    ) -> Result<RawRunResult, SpawnError> {
        command::run(invocation, timeout, cfg.limits.output_cap, self.cancel).await
    }
}

/// The product of a build step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactKind {
    /// A linked test binary.
    Binary(PathBuf),
    /// A syntax-checked module, imported at run time.
    Module { path: PathBuf, name: String },
    /// An analysed and elaborated design.
    Design {
        workdir: PathBuf,
        entity: String,
        bitstream: Option<PathBuf>,
    },
}

/// What an adapter's build step returns before packaging.
#[derive(Debug)]
pub struct Built {
    pub kind: ArtifactKind,
    pub log: String,
}

/// An immutable build product, shared read-only by the sub-tests of one
/// artifact group. Its build directory is removed when the last sharer drops it.
/// 不可变的构建产物，由同一产物组的子测试只读共享。
#[derive(Debug)]
pub struct BuildArtifact {
    pub kind: ArtifactKind,
    pub log: String,
    pub elapsed: Duration,
    build_dir: BuildContext,
}

impl BuildArtifact {
    pub fn dir(&self) -> &Path {
        &self.build_dir.path
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildFailure {
    Unavailable { tool: String },
    /// The toolchain rejected the student's code.
    Diagnostics { log: String, exit_code: Option<i32> },
    TimedOut { log: String },
    /// The build could not be prepared (temporary directory, generated files).
    Environment(String),
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LintReport {
    pub output: String,
    pub warnings: Option<u64>,
    pub score: Option<f64>,
    pub skipped: bool,
}

impl LintReport {
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LintFailure {
    Unavailable { tool: String },
    /// The configured threshold was exceeded.
    Violations { output: String, detail: String },
    /// The linter itself failed, typically on code that does not parse.
    ToolFailed { output: String },
    TimedOut { output: String },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Normal,
    AssertionFailed { detail: String },
}

/// The raw run plus the adapter's reading of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunObservation {
    pub raw: RawRunResult,
    /// The value compared against `EXPECT`.
    pub observed: String,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunFailure {
    Unavailable { tool: String },
    Spawn(String),
    Cancelled,
}

/// The toolchain adapters, selected by [`ToolchainKind`].
/// 按 [`ToolchainKind`] 选择的工具链适配器。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toolchain {
    Compiled,
    Script,
    Hdl,
}

impl Toolchain {
    pub fn for_kind(kind: ToolchainKind) -> Self {
        match kind {
            ToolchainKind::Compiled => Self::Compiled,
            ToolchainKind::Script => Self::Script,
            ToolchainKind::Hdl => Self::Hdl,
        }
    }

    /// Executables that must exist before anything runs.
    pub fn required_tools(&self, cfg: &EffectiveConfig) -> Vec<ToolRequirement> {
        let env = &cfg.env;
        let mut wanted: Vec<(&'static str, &Option<String>)> = match self {
            Self::Compiled => vec![("COMPILER", &env.compiler)],
            Self::Script => vec![("INTERPRETER", &env.interpreter)],
            Self::Hdl => vec![("SIMULATOR", &env.simulator)],
        };
        if cfg.lint.enabled && *self != Self::Hdl {
            wanted.push(("LINTER", &env.linter));
        }
        if *self == Self::Hdl && cfg.build.synth {
            wanted.push(("SYNTHESIZER", &env.synthesizer));
        }
        wanted
            .into_iter()
            .filter_map(|(key, name)| {
                name.as_ref().map(|name| ToolRequirement {
                    key,
                    name: name.clone(),
                })
            })
            .collect()
    }

    /// Builds the artifact in a fresh build directory. Failed build directories
    /// are copied to `KEEP_FAILED` when configured.
    pub async fn build(
        &self,
        ctx: &ExecContext<'_>,
        cfg: &EffectiveConfig,
    ) -> Result<BuildArtifact, BuildFailure> {
        let label = ctx
            .spec
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let build_dir = BuildContext::create(cfg.env.build_root.as_deref(), &label)
            .map_err(|e| BuildFailure::Environment(format!("{e:#}")))?;
        debug!(file = %ctx.spec.path.display(), dir = %build_dir.path.display(), "Building");

        let start = Instant::now();
        let built = match self {
            Self::Compiled => compiled::build(ctx, cfg, &build_dir.path).await,
            Self::Script => script::build(ctx, cfg, &build_dir.path).await,
            Self::Hdl => hdl::build(ctx, cfg, &build_dir.path).await,
        };
        let elapsed = start.elapsed();

        match built {
            Ok(built) => Ok(BuildArtifact {
                kind: built.kind,
                log: cap_text(&built.log, cfg.limits.output_cap),
                elapsed,
                build_dir,
            }),
            Err(failure) => {
                if let (Some(keep), BuildFailure::Diagnostics { .. } | BuildFailure::TimedOut { .. }) =
                    (&cfg.env.keep_failed, &failure)
                {
                    preserve_failed(&build_dir.path, keep, &label);
                }
                Err(cap_failure(failure, cfg.limits.output_cap))
            }
        }
    }

    /// Runs the lint step when enabled. HDL has none.
    pub async fn lint(
        &self,
        ctx: &ExecContext<'_>,
        cfg: &EffectiveConfig,
    ) -> Result<LintReport, LintFailure> {
        if !cfg.lint.enabled {
            return Ok(LintReport::skipped());
        }
        match self {
            Self::Compiled => compiled::lint(ctx, cfg).await,
            Self::Script => script::lint(ctx, cfg).await,
            Self::Hdl => Ok(LintReport::skipped()),
        }
    }

    pub async fn run(
        &self,
        ctx: &ExecContext<'_>,
        artifact: &BuildArtifact,
        decl: &SubTestDeclaration,
        cfg: &EffectiveConfig,
    ) -> Result<RunObservation, RunFailure> {
        match self {
            Self::Compiled => compiled::run(ctx, artifact, decl, cfg).await,
            Self::Script => script::run(ctx, artifact, decl, cfg).await,
            Self::Hdl => hdl::run(ctx, artifact, decl, cfg).await,
        }
    }
}

fn preserve_failed(build_dir: &Path, keep: &Path, label: &str) {
    let target = keep.join(fs::sanitize_name(label));
    match fs::copy_dir_all(build_dir, &target) {
        Ok(()) => debug!(target = %target.display(), "Preserved failed build directory"),
        Err(e) => warn!(error = %e, "Could not preserve failed build directory"),
    }
}

fn cap_failure(failure: BuildFailure, cap: usize) -> BuildFailure {
    match failure {
        BuildFailure::Diagnostics { log, exit_code } => BuildFailure::Diagnostics {
            log: cap_text(&log, cap),
            exit_code,
        },
        BuildFailure::TimedOut { log } => BuildFailure::TimedOut {
            log: cap_text(&log, cap),
        },
        other => other,
    }
}

/// Folds one build-step invocation into the running build log.
fn build_step(
    result: Result<RawRunResult, SpawnError>,
    log: &mut String,
) -> Result<(), BuildFailure> {
    let raw = match result {
        Ok(raw) => raw,
        Err(SpawnError::NotFound(program)) => {
            return Err(BuildFailure::Unavailable {
                tool: program.display().to_string(),
            });
        }
        Err(e) => return Err(BuildFailure::Environment(e.to_string())),
    };
    log.push_str(&raw.combined_output());
    if raw.cancelled {
        Err(BuildFailure::Cancelled)
    } else if raw.timed_out {
        Err(BuildFailure::TimedOut { log: log.clone() })
    } else if !raw.success() {
        Err(BuildFailure::Diagnostics {
            log: log.clone(),
            exit_code: raw.exit_code,
        })
    } else {
        Ok(())
    }
}

/// Turns a lint invocation into its raw result or the matching failure.
fn lint_step(result: Result<RawRunResult, SpawnError>) -> Result<RawRunResult, LintFailure> {
    let raw = match result {
        Ok(raw) => raw,
        Err(SpawnError::NotFound(program)) => {
            return Err(LintFailure::Unavailable {
                tool: program.display().to_string(),
            });
        }
        Err(e) => {
            return Err(LintFailure::ToolFailed {
                output: e.to_string(),
            });
        }
    };
    if raw.cancelled {
        Err(LintFailure::Cancelled)
    } else if raw.timed_out {
        Err(LintFailure::TimedOut {
            output: raw.combined_output(),
        })
    } else {
        Ok(raw)
    }
}

fn run_step(result: Result<RawRunResult, SpawnError>) -> Result<RawRunResult, RunFailure> {
    match result {
        Ok(raw) if raw.cancelled => Err(RunFailure::Cancelled),
        Ok(raw) => Ok(raw),
        Err(SpawnError::NotFound(program)) => Err(RunFailure::Unavailable {
            tool: program.display().to_string(),
        }),
        Err(e) => Err(RunFailure::Spawn(e.to_string())),
    }
}

/// Resolves the student's source files against the submission root. An empty
/// `SOURCES` selects every file with one of `extensions` in the root.
fn student_sources(
    submission: &Submission,
    sources: &[String],
    extensions: &[&str],
) -> Result<Vec<PathBuf>, String> {
    if sources.is_empty() {
        let entries = std::fs::read_dir(&submission.root).map_err(|e| {
            format!(
                "cannot read submission {}: {e}",
                submission.root.display()
            )
        })?;
        let mut found: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| extensions.contains(&e.to_ascii_lowercase().as_str()))
            })
            .collect();
        found.sort();
        return Ok(found);
    }
    let mut resolved = Vec::with_capacity(sources.len());
    for source in sources {
        let path = submission.root.join(source);
        if !path.is_file() {
            return Err(format!("missing student source: {source}"));
        }
        resolved.push(path);
    }
    Ok(resolved)
}
