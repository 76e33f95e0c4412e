//! # Core Module / 核心模块
//!
//! This module contains the grading pipeline itself: directive parsing,
//! configuration resolution, the test-item model, result classification and
//! the engine that drives `collect` and `execute`.
//!
//! 此模块包含评分管道本身：指令解析、配置解析、测试项模型、
//! 结果分类以及驱动 `collect` 和 `execute` 的引擎。

pub mod classify;
pub mod config;
pub mod directive;
pub mod engine;
pub mod grammar;
pub mod items;
pub mod models;

// Re-exports
pub use config::{ConfigError, ConfigStore, EffectiveConfig};
pub use engine::{Cancelled, Engine};
pub use items::{CollectedFile, Submission, TestItem};
pub use models::{ExecutionOutcome, OutcomeKind, SubTestReport, ToolchainKind};
