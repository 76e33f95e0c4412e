//! Subcommand implementations.

pub mod collect;
pub mod run;

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::warn;

use crate::core::config::ConfigStore;
use crate::core::grammar;
use crate::infra::t;

/// Loads the configuration store and applies `--set KEY=VALUE` overrides to
/// its cohort table.
pub(crate) fn load_store(
    config: Option<PathBuf>,
    overrides: &[String],
    locale: &str,
) -> Result<ConfigStore> {
    let mut store = match &config {
        Some(path) => ConfigStore::load(path)?,
        None => ConfigStore::default(),
    };
    for assignment in overrides {
        let (key, value) = assignment
            .split_once('=')
            .with_context(|| t!("invalid_override", locale = locale, value = assignment))?;
        let key = key.trim();
        if grammar::lookup(key).is_none() {
            warn!(key = %key, "Unknown configuration key ignored");
            continue;
        }
        store.set_cohort(key, value);
    }
    Ok(store)
}
