//! # Execution Engine / 执行引擎
//!
//! The two-call host protocol: [`Engine::collect`] enumerates the sub-tests of a
//! file, [`Engine::execute`] drives one sub-test through
//! `Resolving → Building → Linting → Running → Comparing` and returns its report.
//! [`Engine::execute_all`] is the bounded parallel driver used by the CLI.
//!
//! 两次调用的宿主协议：[`Engine::collect`] 枚举文件中的子测试，
//! [`Engine::execute`] 驱动一个子测试走完整个管道并返回其报告。

use futures::{StreamExt, stream};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::classify;
use crate::core::config::ConfigStore;
use crate::core::items::{CollectedFile, Submission, TestItem, TestSpecFile};
use crate::core::models::{ExecutionOutcome, OutcomeKind, SubTestReport, ToolchainKind};
use crate::infra::fs;
use crate::toolchain::{BuildFailure, ExecContext, ResolvedTools, Toolchain};

/// Returned by `execute` when the run was interrupted. In-flight processes
/// have been killed by the time this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("execution cancelled")]
pub struct Cancelled;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported test specification file: {}", .0.display())]
    Unsupported(PathBuf),
}

/// Reports of one `execute_all` call, ordered by file then line.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub reports: Vec<SubTestReport>,
    /// Sub-tests that were interrupted before producing a report.
    pub cancelled: usize,
}

impl RunSummary {
    pub fn passed(&self) -> usize {
        self.count(OutcomeKind::Pass)
    }

    pub fn count(&self, kind: OutcomeKind) -> usize {
        self.reports.iter().filter(|r| r.outcome == kind).count()
    }

    pub fn all_passed(&self) -> bool {
        self.cancelled == 0 && self.reports.iter().all(|r| r.outcome.is_pass())
    }
}

/// The default parallelism of `execute_all`.
pub fn default_jobs() -> usize {
    num_cpus::get() / 2 + 1
}

type ToolKey = (String, Vec<PathBuf>);

/// The grading engine for one submission.
/// 针对一份提交的评分引擎。
pub struct Engine {
    store: ConfigStore,
    submission: Submission,
    located: Mutex<HashMap<ToolKey, Option<PathBuf>>>,
}

impl Engine {
    pub fn new(store: ConfigStore, submission: Submission) -> Self {
        Self {
            store,
            submission,
            located: Mutex::new(HashMap::new()),
        }
    }

    pub fn submission(&self) -> &Submission {
        &self.submission
    }

    /// Reads and parses a test specification file. The toolchain is chosen by
    /// extension.
    pub fn collect(&self, path: &Path) -> Result<CollectedFile, CollectError> {
        let kind =
            ToolchainKind::from_path(path).ok_or_else(|| CollectError::Unsupported(path.to_path_buf()))?;
        let text = std::fs::read_to_string(path).map_err(|source| CollectError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.collect_source(path, kind, text))
    }

    /// Parses already-loaded text as a test specification file.
    pub fn collect_source(
        &self,
        path: impl Into<PathBuf>,
        kind: ToolchainKind,
        text: String,
    ) -> CollectedFile {
        let spec = TestSpecFile::parse(path, kind, text);
        for (key, line) in spec.parsed.environment_directives() {
            warn!(
                file = %spec.path.display(),
                key = %key,
                line,
                "Environment directive ignored; set it in the cohort configuration"
            );
        }
        let collected = CollectedFile::new(
            spec,
            self.store.defaults_layer(kind),
            self.store.cohort_layer(),
        );
        debug!(
            file = %collected.spec.path.display(),
            count = collected.count(),
            "Collected sub-tests"
        );
        collected
    }

    /// Executes one sub-test and classifies its outcome.
    ///
    /// Every failure becomes a report; only cancellation is an `Err`.
    ///
    /// 执行一个子测试并对其结果进行分类。所有失败都会成为报告；只有取消会返回 `Err`。
    pub async fn execute(
        &self,
        item: &TestItem,
        cancel: &CancellationToken,
    ) -> Result<SubTestReport, Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        let start = Instant::now();
        let outcome = self.pipeline(item, cancel).await?;
        let outcome = outcome.with_elapsed(start.elapsed());
        info!(
            test = %item.id(),
            outcome = %outcome.kind,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "Sub-test finished"
        );
        Ok(item.report(outcome))
    }

    async fn pipeline(
        &self,
        item: &TestItem,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome, Cancelled> {
        debug!(test = %item.id(), "Resolving configuration");
        let cfg = match item.config() {
            Ok(cfg) => cfg,
            Err(error) => return Ok(classify::config_error(&error)),
        };

        let toolchain = Toolchain::for_kind(item.kind());
        let mut tools = ResolvedTools::default();
        for requirement in toolchain.required_tools(cfg) {
            match self.locate(&requirement.name, &cfg.env.search_paths) {
                Some(path) => tools.insert(requirement.key, path),
                None => return Ok(classify::unavailable(&requirement.name)),
            }
        }
        let ctx = ExecContext {
            spec: item.spec(),
            submission: &self.submission,
            tools: &tools,
            cancel,
        };

        debug!(test = %item.id(), "Building");
        let cell = item.file_state().build_cell(&cfg.artifact_key());
        let shared = cell
            .get_or_try_init(|| async {
                match toolchain.build(&ctx, cfg).await {
                    // Not cached: the next sharer builds again.
                    Err(BuildFailure::Cancelled) => Err(Cancelled),
                    built => Ok(built.map(Arc::new)),
                }
            })
            .await?;
        let artifact = match shared {
            Ok(artifact) => Arc::clone(artifact),
            Err(failure) => return classify::build_failure(failure),
        };

        debug!(test = %item.id(), "Linting");
        if let Err(failure) = toolchain.lint(&ctx, cfg).await {
            return classify::lint_failure(&failure);
        }

        debug!(test = %item.id(), "Running");
        match toolchain
            .run(&ctx, &artifact, item.declaration(), cfg)
            .await
        {
            Ok(observation) => Ok(classify::run_outcome(&observation, cfg)),
            Err(failure) => classify::run_failure(&failure),
        }
    }

    /// Finds an executable, remembering the answer for the engine's lifetime.
    fn locate(&self, name: &str, search_paths: &[PathBuf]) -> Option<PathBuf> {
        let key = (name.to_string(), search_paths.to_vec());
        if let Some(found) = self
            .located
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&key)
        {
            return found.clone();
        }
        let found = fs::find_executable(name, search_paths);
        self.located
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(key, found.clone());
        found
    }

    /// Executes items in parallel, at most `jobs` at a time.
    ///
    /// 并行执行测试项，同时最多 `jobs` 个。
    pub async fn execute_all(
        self: &Arc<Self>,
        items: Vec<TestItem>,
        jobs: usize,
        cancel: &CancellationToken,
    ) -> RunSummary {
        let results = stream::iter(items.into_iter().map(|item| {
            let engine = Arc::clone(self);
            let cancel = cancel.clone();
            let fallback = item.clone();
            async move {
                let handle = tokio::spawn(async move { engine.execute(&item, &cancel).await });
                match handle.await {
                    Ok(result) => result.ok(),
                    Err(e) => Some(fallback.report(ExecutionOutcome::new(
                        OutcomeKind::ToolchainUnavailable,
                        format!("internal engine failure: {e}"),
                    ))),
                }
            }
        }))
        .buffer_unordered(jobs.max(1))
        .collect::<Vec<Option<SubTestReport>>>()
        .await;

        let cancelled = results.iter().filter(|r| r.is_none()).count();
        let mut reports: Vec<SubTestReport> = results.into_iter().flatten().collect();
        reports.sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));
        RunSummary { reports, cancelled }
    }
}
