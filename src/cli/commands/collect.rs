//! # Collect Command Module / 收集命令模块
//!
//! Lists the sub-tests each file declares without executing anything.
//!
//! 列出每个文件声明的子测试，不执行任何内容。

use anyhow::Result;
use colored::*;
use std::path::PathBuf;

use crate::core::engine::Engine;
use crate::core::items::Submission;
use crate::infra::t;

pub fn execute(
    files: &[PathBuf],
    config: Option<PathBuf>,
    overrides: &[String],
    locale: &str,
) -> Result<()> {
    let store = super::load_store(config, overrides, locale)?;
    let engine = Engine::new(store, Submission::new("", "."));

    let mut total = 0;
    for path in files {
        let collected = engine.collect(path)?;
        println!(
            "{}",
            t!(
                "collected_file",
                locale = locale,
                path = path.display(),
                kind = collected.spec.kind,
                count = collected.count()
            )
            .bold()
        );
        for item in &collected.items {
            println!("  - {:<40} {}", item.name().cyan(), format!("line {}", item.line()).dimmed());
        }
        total += collected.count();
    }
    println!(
        "\n{}",
        t!("collected_total", locale = locale, count = total, files = files.len())
    );
    Ok(())
}
