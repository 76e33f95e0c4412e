//! # Test-Item Model / 测试项模型
//!
//! The in-memory tree handed to the host: one [`CollectedFile`] per test
//! specification file, holding one [`TestItem`] per declared sub-test. Items are
//! cheap to clone and safe to execute from any task; they share the parsed file,
//! the configuration layers and the per-file build cache through `Arc`s.
//!
//! 交给宿主的内存树：每个测试规范文件对应一个 [`CollectedFile`]，
//! 其中每个声明的子测试对应一个 [`TestItem`]。

use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::core::config::{self, ConfigError, ConfigLayer, EffectiveConfig, LayerSource};
use crate::core::directive::{self, DirectiveSet, ParsedSpec, SubTestDeclaration};
use crate::core::models::{ExecutionOutcome, SubTestReport, ToolchainKind};
use crate::toolchain::{BuildArtifact, BuildFailure};

/// The student whose code is under test, and where it lives.
/// 被测试代码所属的学生及其代码位置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub student: String,
    pub root: PathBuf,
}

impl Submission {
    pub fn new(student: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            student: student.into(),
            root: root.into(),
        }
    }
}

/// A parsed test specification file. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSpecFile {
    pub path: PathBuf,
    pub kind: ToolchainKind,
    pub text: String,
    pub parsed: ParsedSpec,
}

impl TestSpecFile {
    pub fn parse(path: impl Into<PathBuf>, kind: ToolchainKind, text: String) -> Self {
        let parsed = directive::parse(kind, &text);
        Self {
            path: path.into(),
            kind,
            text,
            parsed,
        }
    }

    pub fn globals(&self) -> &DirectiveSet {
        &self.parsed.globals
    }
}

/// The shared outcome of one artifact group's build.
pub type SharedBuild = Result<Arc<BuildArtifact>, BuildFailure>;

/// One lazily-initialised build per artifact key.
#[derive(Default)]
pub(crate) struct FileState {
    builds: Mutex<HashMap<String, Arc<tokio::sync::OnceCell<SharedBuild>>>>,
}

impl FileState {
    pub(crate) fn build_cell(&self, key: &str) -> Arc<tokio::sync::OnceCell<SharedBuild>> {
        let mut builds = self.builds.lock().unwrap_or_else(|p| p.into_inner());
        Arc::clone(builds.entry(key.to_string()).or_default())
    }
}

/// Defaults, cohort and file layers, shared by every item of one file.
struct Layers {
    defaults: ConfigLayer,
    cohort: ConfigLayer,
    file: ConfigLayer,
}

struct ItemInner {
    spec: Arc<TestSpecFile>,
    index: usize,
    duplicate: bool,
    layers: Arc<Layers>,
    subtest: ConfigLayer,
    config: OnceCell<Result<EffectiveConfig, ConfigError>>,
    state: Arc<FileState>,
}

/// One executable sub-test.
/// 一个可执行的子测试。
#[derive(Clone)]
pub struct TestItem {
    inner: Arc<ItemInner>,
}

impl TestItem {
    pub fn spec(&self) -> &TestSpecFile {
        &self.inner.spec
    }

    pub fn declaration(&self) -> &SubTestDeclaration {
        &self.inner.spec.parsed.tests[self.inner.index]
    }

    pub fn name(&self) -> &str {
        &self.declaration().name
    }

    pub fn line(&self) -> usize {
        self.declaration().line
    }

    pub fn kind(&self) -> ToolchainKind {
        self.inner.spec.kind
    }

    /// `file::name`, as used in logs and reports.
    pub fn id(&self) -> String {
        format!("{}::{}", self.inner.spec.path.display(), self.name())
    }

    /// The effective configuration, resolved on first use and cached.
    pub fn config(&self) -> Result<&EffectiveConfig, ConfigError> {
        let resolved = self.inner.config.get_or_init(|| {
            if self.inner.duplicate {
                return Err(ConfigError::Duplicate {
                    name: self.name().to_string(),
                    line: self.line(),
                });
            }
            let layers = &self.inner.layers;
            config::resolve(
                self.kind(),
                &layers.defaults,
                &layers.cohort,
                &layers.file,
                &self.inner.subtest,
            )
        });
        resolved.as_ref().map_err(|e| e.clone())
    }

    pub(crate) fn file_state(&self) -> &FileState {
        &self.inner.state
    }

    pub fn report(&self, outcome: ExecutionOutcome) -> SubTestReport {
        SubTestReport {
            file: self.inner.spec.path.clone(),
            name: self.name().to_string(),
            line: self.line(),
            outcome: outcome.kind,
            elapsed: outcome.elapsed,
            diagnostic: outcome.diagnostic,
            exit_code: outcome.exit_code,
        }
    }
}

impl fmt::Debug for TestItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestItem")
            .field("id", &self.id())
            .field("line", &self.line())
            .finish_non_exhaustive()
    }
}

/// Everything collected from one file. Zero items is a valid result.
/// 从一个文件收集到的所有内容。零个测试项是有效结果。
#[derive(Debug, Clone)]
pub struct CollectedFile {
    pub spec: Arc<TestSpecFile>,
    pub items: Vec<TestItem>,
}

impl CollectedFile {
    pub(crate) fn new(spec: TestSpecFile, defaults: ConfigLayer, cohort: ConfigLayer) -> Self {
        let spec = Arc::new(spec);
        let layers = Arc::new(Layers {
            defaults,
            cohort,
            file: ConfigLayer::from_directives(LayerSource::File, spec.globals()),
        });
        let state = Arc::new(FileState::default());

        let mut seen = HashMap::new();
        let items = spec
            .parsed
            .tests
            .iter()
            .enumerate()
            .map(|(index, decl)| {
                let duplicate = seen.insert(decl.name.clone(), decl.line).is_some();
                TestItem {
                    inner: Arc::new(ItemInner {
                        spec: Arc::clone(&spec),
                        index,
                        duplicate,
                        layers: Arc::clone(&layers),
                        subtest: ConfigLayer::from_directives(LayerSource::SubTest, &decl.directives),
                        config: OnceCell::new(),
                        state: Arc::clone(&state),
                    }),
                }
            })
            .collect();
        Self { spec, items }
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
