//! Full build: every stage once, in order

use crate::config::{BuildConfig, Stage};
use crate::error::{BuildError, BuildResult};
use crate::pipeline::StageReport;
use crate::runner::run_stage;
use std::time::Instant;
use tracing::{error, info, warn};

/// Reports of one full build, in build order
#[derive(Debug, Clone, Default)]
pub struct BuildSummary {
    pub reports: Vec<StageReport>,
}

impl BuildSummary {
    pub fn report(&self, stage: Stage) -> Option<&StageReport> {
        self.reports.iter().find(|report| report.stage == stage)
    }

    pub fn written(&self) -> usize {
        self.reports.iter().map(|r| r.written.len()).sum()
    }

    pub fn skipped(&self) -> usize {
        self.reports.iter().map(|r| r.skipped.len()).sum()
    }

    pub fn failures(&self) -> usize {
        self.reports.iter().map(|r| r.failures.len()).sum()
    }
}

/// Run style, script, image, font and markup one after another.
///
/// A stage-level error only aborts that stage: it is logged and the next
/// stage still runs. Once every stage has run, any such errors are returned
/// together as `BuildError::StagesFailed`.
pub async fn build_all(config: &BuildConfig) -> BuildResult<BuildSummary> {
    let started = Instant::now();
    let mut summary = BuildSummary::default();
    let mut stage_errors = Vec::new();

    for stage in config.stages() {
        match run_stage(stage).await {
            Ok(report) => summary.reports.push(report),
            Err(e) => {
                error!(stage = %stage.stage, "Stage '{}' failed: {}", stage.stage, e);
                stage_errors.push((stage.stage, e));
            }
        }
    }

    let elapsed = started.elapsed();
    if !stage_errors.is_empty() {
        error!(
            "Build finished after {:?} with {} failed stages: {} written, {} up to date",
            elapsed,
            stage_errors.len(),
            summary.written(),
            summary.skipped()
        );
        return Err(BuildError::StagesFailed(stage_errors));
    }

    if summary.failures() == 0 {
        info!(
            "Build finished after {:?}: {} written, {} up to date",
            elapsed,
            summary.written(),
            summary.skipped()
        );
    } else {
        warn!(
            "Build finished after {:?} with {} failed files: {} written, {} up to date",
            elapsed,
            summary.failures(),
            summary.written(),
            summary.skipped()
        );
    }

    Ok(summary)
}
