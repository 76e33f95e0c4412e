//! # Data Models Module / 数据模型模块
//!
//! This module defines the core data structures shared by the grading pipeline.
//! It includes the toolchain kinds, the closed outcome taxonomy, per-sub-test
//! reports and the isolated build context used by every toolchain adapter.
//!
//! 此模块定义了评分管道共享的核心数据结构。
//! 它包括工具链类型、封闭的结果分类、每个子测试的报告以及每个工具链适配器使用的隔离构建上下文。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// The toolchain a test specification file targets.
/// 测试规范文件所针对的工具链。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolchainKind {
    /// C sources compiled with a mock test harness.
    /// 使用模拟测试工具编译的 C 源代码。
    Compiled,
    /// Python modules loaded and called in an isolated interpreter.
    /// 在隔离解释器中加载和调用的 Python 模块。
    Script,
    /// VHDL designs analysed, elaborated and simulated against a testbench.
    /// 针对测试平台进行分析、细化和仿真的 VHDL 设计。
    Hdl,
}

impl ToolchainKind {
    pub const ALL: [ToolchainKind; 3] = [Self::Compiled, Self::Script, Self::Hdl];

    /// Selects the toolchain from a file extension (`.c`, `.py`, `.vhd`, `.vhdl`).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "c" => Some(Self::Compiled),
            "py" => Some(Self::Script),
            "vhd" | "vhdl" => Some(Self::Hdl),
            _ => None,
        }
    }

    /// The native line-comment leader that carries directives.
    pub fn comment_leader(self) -> &'static str {
        match self {
            Self::Compiled => "//",
            Self::Script => "#",
            Self::Hdl => "--",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compiled => "compiled",
            Self::Script => "script",
            Self::Hdl => "hdl",
        }
    }
}

impl fmt::Display for ToolchainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enumerates every terminal classification of a sub-test execution.
/// 枚举子测试执行的每一种终止分类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeKind {
    /// The run was clean and the observed value matched.
    /// 运行正常且观察值匹配。
    Pass,
    /// An assertion or value comparison did not hold.
    /// 断言或值比较不成立。
    Fail,
    /// The build step (compile, analysis, elaboration, synthesis) failed.
    /// 构建步骤（编译、分析、细化、综合）失败。
    CompileError,
    /// The lint step exceeded its configured threshold.
    /// 代码检查步骤超出了配置的阈值。
    LintError,
    /// A phase exceeded its configured wall-clock bound.
    /// 某个阶段超出了配置的时间上限。
    Timeout,
    /// The program crashed, raised, or exited with an unexpected status.
    /// 程序崩溃、抛出异常或以意外状态退出。
    RuntimeError,
    /// A required executable could not be located. Not the student's fault.
    /// 找不到所需的可执行文件。不是学生的问题。
    ToolchainUnavailable,
    /// A directive or configuration value was malformed or missing.
    /// 指令或配置值格式错误或缺失。
    ConfigError,
}

impl OutcomeKind {
    pub const ALL: [OutcomeKind; 8] = [
        Self::Pass,
        Self::Fail,
        Self::CompileError,
        Self::LintError,
        Self::Timeout,
        Self::RuntimeError,
        Self::ToolchainUnavailable,
        Self::ConfigError,
    ];

    pub fn is_pass(self) -> bool {
        self == Self::Pass
    }

    /// Environment and configuration problems are reported but not charged to the student.
    pub fn counts_against_student(self) -> bool {
        !matches!(self, Self::Pass | Self::ToolchainUnavailable | Self::ConfigError)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "Pass",
            Self::Fail => "Fail",
            Self::CompileError => "CompileError",
            Self::LintError => "LintError",
            Self::Timeout => "Timeout",
            Self::RuntimeError => "RuntimeError",
            Self::ToolchainUnavailable => "ToolchainUnavailable",
            Self::ConfigError => "ConfigError",
        }
    }

    /// Gets the CSS class used by the HTML report.
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Pass => "status-pass",
            Self::Fail => "status-fail",
            Self::Timeout => "status-timeout",
            Self::ToolchainUnavailable | Self::ConfigError => "status-environment",
            _ => "status-error",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The classified result of one sub-test execution. Never mutated once returned
/// to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub kind: OutcomeKind,
    /// Verbatim toolchain output (capped) or a short explanation.
    pub diagnostic: String,
    pub elapsed: Duration,
    pub exit_code: Option<i32>,
}

impl ExecutionOutcome {
    pub fn new(kind: OutcomeKind, diagnostic: impl Into<String>) -> Self {
        Self {
            kind,
            diagnostic: diagnostic.into(),
            elapsed: Duration::ZERO,
            exit_code: None,
        }
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn with_exit_code(mut self, exit_code: Option<i32>) -> Self {
        self.exit_code = exit_code;
        self
    }
}

/// The structured report handed to the host for every executed sub-test.
/// 每个已执行子测试交给宿主的结构化报告。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTestReport {
    /// The test specification file the sub-test was declared in.
    pub file: PathBuf,
    pub name: String,
    /// 1-based line of the declaration.
    pub line: usize,
    pub outcome: OutcomeKind,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
    pub diagnostic: String,
    pub exit_code: Option<i32>,
}

impl SubTestReport {
    /// Gets the `file::name` identifier used in logs and summaries.
    pub fn id(&self) -> String {
        format!("{}::{}", self.file.display(), self.name)
    }
}

/// Serializes a `Duration` as fractional seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// A context for a single build, managing its isolated temporary directory.
/// The temporary directory is automatically deleted when this struct is dropped,
/// ensuring cleanup. One context exists per shared-artifact group, so parallel
/// builds never collide.
/// 单个构建的上下文，管理其隔离的临时目录。
/// 当此结构体被丢弃时，临时目录会自动删除，以确保清理。
pub struct BuildContext {
    /// The `TempDir` guard. When this goes out of scope, the directory on disk is deleted.
    /// `TempDir` 的 guard。当它超出作用域时，磁盘上的目录将被删除。
    _temp_root: TempDir,
    /// The absolute path of the build directory.
    /// 构建目录的绝对路径。
    pub path: PathBuf,
}

impl BuildContext {
    /// Creates a fresh build directory, inside `root` when given, otherwise in the
    /// system temporary directory.
    pub fn create(root: Option<&Path>, label: &str) -> Result<Self> {
        let prefix = format!("automark_{}_", crate::infra::fs::sanitize_name(label));
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let temp_dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root).with_context(|| {
                    format!("Failed to create build root: {}", root.display())
                })?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .with_context(|| "Failed to create temporary build directory".to_string())?;
        let path = temp_dir.path().to_path_buf();
        Ok(Self {
            _temp_root: temp_dir,
            path,
        })
    }
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
