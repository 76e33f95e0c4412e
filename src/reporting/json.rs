//! Machine-readable report: the run's metadata plus every `SubTestReport`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::core::items::Submission;
use crate::core::models::{OutcomeKind, SubTestReport};

#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub student: &'a str,
    pub submission: &'a Path,
    pub cohort: Option<&'a str>,
    /// Count per outcome kind; kinds with no report are omitted.
    pub totals: BTreeMap<&'static str, usize>,
    pub reports: &'a [SubTestReport],
}

impl<'a> JsonReport<'a> {
    pub fn new(reports: &'a [SubTestReport], submission: &'a Submission, cohort: Option<&'a str>) -> Self {
        let mut totals = BTreeMap::new();
        for kind in OutcomeKind::ALL {
            let count = reports.iter().filter(|r| r.outcome == kind).count();
            if count > 0 {
                totals.insert(kind.as_str(), count);
            }
        }
        Self {
            generated_at: Utc::now(),
            student: &submission.student,
            submission: &submission.root,
            cohort,
            totals,
            reports,
        }
    }
}

pub fn write_json_report(
    reports: &[SubTestReport],
    submission: &Submission,
    cohort: Option<&str>,
    output_path: &Path,
) -> Result<()> {
    let report = JsonReport::new(reports, submission, cohort);
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report: {}", output_path.display()))?;
    Ok(())
}
