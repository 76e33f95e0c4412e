//! # Reporting Module / 报告模块
//!
//! Renders sub-test reports for the reference host: a colored console summary,
//! a self-contained HTML page and a machine-readable JSON file.
//!
//! 为参考宿主呈现子测试报告：彩色控制台摘要、独立的 HTML 页面以及机器可读的 JSON 文件。

pub mod console;
pub mod html;
pub mod json;

pub use console::{print_failure_details, print_summary};
pub use html::generate_html_report;
pub use json::write_json_report;
