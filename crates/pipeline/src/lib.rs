#![forbid(unsafe_code)]

pub mod config;
pub mod pipeline;
pub mod stats;

pub use config::{
    run_pipeline, OutlierParams, PipelineConfig, SmoothMethod, SmoothParams, DEFAULT_BIN_SCALE,
    DEFAULT_MEAN_K, DEFAULT_STD_MULTIPLIER,
};
pub use pipeline::{Pipeline, Stage};
pub use stats::{StageStats, Stats};
