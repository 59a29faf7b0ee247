//! Point cloud cropping, minimum-distance sampling, statistical outlier
//! removal and smoothing.
//!
//! The work is split over several crates, re-exported here:
//!
//! - [`spatial`]: the k-d tree behind every neighbourhood query
//! - [`filters`]: sampling, outlier removal, spacing estimation, smoothing
//! - [`io`]: the PLY codec and the GeoJSON boundary loader
//! - [`pipeline`]: the stage sequence tying them together
//!
//! ```no_run
//! use fpcfilter::pipeline::{run_pipeline, OutlierParams, PipelineConfig};
//!
//! let config = PipelineConfig {
//!     sample_radius: Some(0.05),
//!     outlier: Some(OutlierParams::default()),
//!     ..PipelineConfig::default()
//! };
//! let stats = run_pipeline("dense.ply", "clean.ply", &config)?;
//! println!("{} stages in {:.1}s", stats.stages.len(), stats.total_seconds);
//! # Ok::<(), fpcfilter::FilterError>(())
//! ```

#![forbid(unsafe_code)]

pub use fpcfilter_core::{
    ensure_positive, Colors, FilterError, Normals, PointCloud, Polygon, Result, Vertex,
};
pub use fpcfilter_filters as filters;
pub use fpcfilter_io as io;
pub use fpcfilter_pipeline as pipeline;
pub use fpcfilter_spatial as spatial;
