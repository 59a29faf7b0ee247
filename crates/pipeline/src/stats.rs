use fpcfilter_filters::OutlierReport;
use serde::Serialize;
use std::path::PathBuf;

/// Point counts and timing for one completed stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageStats {
    pub stage: &'static str,
    pub points_before: usize,
    pub points_after: usize,
    pub seconds: f64,
}

/// Diagnostics collected over one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub stages: Vec<StageStats>,
    pub outlier: Option<OutlierReport>,
    pub estimated_spacing: Option<f64>,
    /// Stages that were skipped, with the reason.
    pub warnings: Vec<String>,
    pub total_seconds: f64,
}

impl Stats {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    pub fn stage(&self, name: &str) -> Option<&StageStats> {
        self.stages.iter().find(|s| s.stage == name)
    }
}
