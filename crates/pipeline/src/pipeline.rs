use crate::stats::{StageStats, Stats};
use fpcfilter_core::{FilterError, PointCloud, Polygon, Result};
use fpcfilter_filters::{
    minimum_distance_sample, smooth_elevation, smooth_surface, statistical_outlier_removal,
    SampleMode,
};
use fpcfilter_io::{read_ply, read_ply_with, write_ply};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Furthest point a [`Pipeline`] has reached. Stages only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Unloaded,
    Loaded,
    Cropped,
    Sampled,
    Filtered,
    Smoothed,
    Written,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Unloaded => "unloaded",
            Stage::Loaded => "load",
            Stage::Cropped => "crop",
            Stage::Sampled => "sample",
            Stage::Filtered => "filter",
            Stage::Smoothed => "smooth",
            Stage::Written => "write",
        }
    }
}

/// Owns a point cloud on its way from `source` to an output file.
///
/// Stages run in the fixed order load/crop, sample, filter, smooth, write;
/// each one is optional. Cropping only happens as part of loading. Any
/// stage that needs the cloud loads it first if nothing has yet.
#[derive(Debug)]
pub struct Pipeline {
    source: PathBuf,
    cloud: Option<PointCloud>,
    stage: Stage,
    sample_mode: SampleMode,
    started: Instant,
    stats: Stats,
}

impl Pipeline {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        Self {
            stats: Stats::new(source.clone()),
            source,
            cloud: None,
            stage: Stage::Unloaded,
            sample_mode: SampleMode::default(),
            started: Instant::now(),
        }
    }

    pub fn with_sample_mode(mut self, mode: SampleMode) -> Self {
        self.sample_mode = mode;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The current cloud, if it has been loaded.
    pub fn cloud(&self) -> Option<&PointCloud> {
        self.cloud.as_ref()
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn into_stats(self) -> Stats {
        self.stats
    }

    /// Read the whole source file. Does nothing if already loaded.
    pub fn load(&mut self) -> Result<()> {
        self.materialize().map(|_| ())
    }

    /// Load the source file, keeping only points whose (x, y) lie inside
    /// `boundary`.
    ///
    /// Fails with [`FilterError::CropAfterLoad`] once the cloud is loaded.
    pub fn crop(&mut self, boundary: &Polygon) -> Result<()> {
        if self.cloud.is_some() {
            return Err(FilterError::CropAfterLoad);
        }

        let start = Instant::now();
        let mut read = 0usize;
        let cloud = read_ply_with(&self.source, |p| {
            read += 1;
            boundary.contains(f64::from(p[0]), f64::from(p[1]))
        })?;

        let kept = cloud.len();
        self.cloud = Some(cloud);
        self.finish(Stage::Cropped, read, kept, start);
        Ok(())
    }

    /// Thin the cloud so no two points are closer than `radius`.
    pub fn sample(&mut self, radius: f64) -> Result<()> {
        self.check_order(Stage::Sampled)?;
        let mode = self.sample_mode;
        let cloud = self.materialize()?;

        let start = Instant::now();
        let before = cloud.len();
        *cloud = minimum_distance_sample(cloud, radius, mode)?;
        let after = cloud.len();

        self.finish(Stage::Sampled, before, after, start);
        Ok(())
    }

    /// Statistical outlier removal over each point's `mean_k` neighbours.
    pub fn filter(&mut self, std_multiplier: f64, mean_k: usize) -> Result<()> {
        self.check_order(Stage::Filtered)?;
        let cloud = self.materialize()?;

        let start = Instant::now();
        let before = cloud.len();
        let (filtered, report) = statistical_outlier_removal(cloud, std_multiplier, mean_k)?;
        *cloud = filtered;
        let after = cloud.len();

        self.stats.outlier = Some(report);
        self.stats.estimated_spacing = report.estimated_spacing;
        self.finish(Stage::Filtered, before, after, start);
        Ok(())
    }

    /// Smooth along normals (`surface`) or in elevation only.
    ///
    /// Surface smoothing of a cloud without normals is skipped with a
    /// warning rather than failing the run.
    pub fn smooth(&mut self, radius: f64, surface: bool, bin_scale: f64) -> Result<()> {
        self.check_order(Stage::Smoothed)?;
        let cloud = self.materialize()?;

        let start = Instant::now();
        let points = cloud.len();
        let result = if surface {
            smooth_surface(cloud, radius, bin_scale)
        } else {
            smooth_elevation(cloud, radius)
        };

        match result {
            Ok(report) => {
                debug!(adjusted = report.adjusted, surface, "smoothing report");
                self.finish(Stage::Smoothed, points, points, start);
                Ok(())
            }
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "skipping smoothing");
                self.stats.warnings.push(format!("smooth skipped: {e}"));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Write the current cloud to `path`, loading it first if needed.
    pub fn write(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let cloud = self.materialize()?;

        let start = Instant::now();
        let points = cloud.len();
        write_ply(path, cloud)?;

        self.stats.output = Some(path.to_path_buf());
        self.finish(Stage::Written, points, points, start);
        Ok(())
    }

    fn check_order(&self, next: Stage) -> Result<()> {
        if self.stage >= next {
            return Err(FilterError::StageOrder {
                stage: next.name(),
                after: self.stage.name(),
            });
        }
        Ok(())
    }

    fn materialize(&mut self) -> Result<&mut PointCloud> {
        let cloud = match self.cloud.take() {
            Some(cloud) => cloud,
            None => {
                let start = Instant::now();
                let cloud = read_ply(&self.source)?;
                self.finish(Stage::Loaded, cloud.len(), cloud.len(), start);
                cloud
            }
        };
        Ok(self.cloud.insert(cloud))
    }

    fn finish(&mut self, stage: Stage, before: usize, after: usize, start: Instant) {
        let seconds = start.elapsed().as_secs_f64();
        info!(
            stage = stage.name(),
            before,
            after,
            seconds,
            "stage complete"
        );

        self.stage = self.stage.max(stage);
        self.stats.stages.push(StageStats {
            stage: stage.name(),
            points_before: before,
            points_after: after,
            seconds,
        });
        self.stats.total_seconds = self.started.elapsed().as_secs_f64();
    }
}
