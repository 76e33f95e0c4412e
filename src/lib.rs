//! # Automark Library / Automark 库
//!
//! This library provides the core functionality for the automark grading engine,
//! a directive-driven executor that builds, lints and runs student submissions
//! against instructor-authored test specification files.
//!
//! 此库为 automark 评分引擎提供核心功能，
//! 这是一个由指令驱动的执行器，按照教师编写的测试规范文件构建、检查并运行学生提交的代码。
//!
//! ## Modules / 模块
//!
//! - `core` - Directive parsing, configuration resolution, classification and the engine
//! - `toolchain` - Compiled, scripting and HDL toolchain adapters
//! - `infra` - Process runner and file system helpers
//! - `reporting` - Console, HTML and JSON reports
//! - `cli` - Reference host command-line interface
//!
//! - `core` - 指令解析、配置解析、结果分类和引擎
//! - `toolchain` - 编译型、脚本型和 HDL 工具链适配器
//! - `infra` - 进程运行器和文件系统工具
//! - `reporting` - 控制台、HTML 和 JSON 报告
//! - `cli` - 参考宿主命令行接口

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;
pub mod toolchain;

// Re-export commonly used items
pub use core::config;
pub use core::engine::Engine;
pub use core::models;

/// Maps a requested locale onto one of the bundled locale files.
pub fn select_locale(requested: &str) -> &'static str {
    let available_locales = rust_i18n::available_locales!();

    // Try to match the full locale first (e.g., "zh-CN")
    // Then try to match the language part only (e.g., "en" from "en-US")
    if let Some(found) = available_locales.iter().find(|l| **l == requested) {
        return *found;
    }
    requested
        .split('-')
        .next()
        .and_then(|lang| available_locales.iter().find(|l| **l == lang))
        .copied()
        .unwrap_or("en")
}

// Initialize i18n
rust_i18n::i18n!("locales", fallback = "en");
