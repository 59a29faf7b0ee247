use crate::pipeline::Pipeline;
use crate::stats::Stats;
use fpcfilter_core::{ensure_positive, FilterError, Polygon, Result};
use fpcfilter_filters::SampleMode;
use std::path::Path;
use tracing::info;

pub const DEFAULT_STD_MULTIPLIER: f64 = 2.5;
pub const DEFAULT_MEAN_K: usize = 16;
pub const DEFAULT_BIN_SCALE: f64 = 0.5;

/// Statistical outlier filter settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierParams {
    pub std_multiplier: f64,
    pub mean_k: usize,
}

impl Default for OutlierParams {
    fn default() -> Self {
        Self {
            std_multiplier: DEFAULT_STD_MULTIPLIER,
            mean_k: DEFAULT_MEAN_K,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmoothMethod {
    /// Median of neighbour elevations.
    Elevation,
    /// Median offset along each point's normal.
    Surface,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothParams {
    pub radius: f64,
    pub method: SmoothMethod,
    /// Only used by [`SmoothMethod::Surface`].
    pub bin_scale: f64,
}

impl SmoothParams {
    pub fn elevation(radius: f64) -> Self {
        Self {
            radius,
            method: SmoothMethod::Elevation,
            bin_scale: DEFAULT_BIN_SCALE,
        }
    }

    pub fn surface(radius: f64) -> Self {
        Self {
            method: SmoothMethod::Surface,
            ..Self::elevation(radius)
        }
    }
}

/// Which stages to run, and with what settings. `None` skips a stage.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub boundary: Option<Polygon>,
    pub sample_radius: Option<f64>,
    pub outlier: Option<OutlierParams>,
    pub smooth: Option<SmoothParams>,
    pub sample_mode: SampleMode,
}

impl PipelineConfig {
    /// Check every parameter up front, so a bad value never leaves a
    /// half-written run behind.
    pub fn validate(&self) -> Result<()> {
        if let Some(radius) = self.sample_radius {
            ensure_positive("sample radius", radius)?;
        }
        if let Some(outlier) = &self.outlier {
            if !outlier.std_multiplier.is_finite() || outlier.std_multiplier < 0.0 {
                return Err(FilterError::invalid(
                    "std multiplier",
                    format!("must be a finite value >= 0, got {}", outlier.std_multiplier),
                ));
            }
            if outlier.mean_k < 1 {
                return Err(FilterError::invalid("mean k", "must be at least 1"));
            }
        }
        if let Some(smooth) = &self.smooth {
            ensure_positive("smooth radius", smooth.radius)?;
            if smooth.method == SmoothMethod::Surface {
                ensure_positive("bin scale", smooth.bin_scale)?;
            }
        }
        Ok(())
    }
}

/// Run every configured stage from `input` to `output`.
pub fn run_pipeline(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<Stats> {
    config.validate()?;

    let mut pipeline = Pipeline::new(input.as_ref()).with_sample_mode(config.sample_mode);

    match &config.boundary {
        Some(boundary) => pipeline.crop(boundary)?,
        None => pipeline.load()?,
    }
    if let Some(radius) = config.sample_radius {
        pipeline.sample(radius)?;
    }
    if let Some(outlier) = config.outlier {
        pipeline.filter(outlier.std_multiplier, outlier.mean_k)?;
    }
    if let Some(smooth) = config.smooth {
        let surface = smooth.method == SmoothMethod::Surface;
        pipeline.smooth(smooth.radius, surface, smooth.bin_scale)?;
    }
    pipeline.write(output)?;

    let stats = pipeline.into_stats();
    info!(
        input = %stats.input.display(),
        total_seconds = stats.total_seconds,
        warnings = stats.warnings.len(),
        "pipeline finished"
    );
    Ok(stats)
}
