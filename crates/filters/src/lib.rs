#![forbid(unsafe_code)]

pub mod median;
pub mod sample;
pub mod smooth;
pub mod spacing;
pub mod statistical_outlier;
pub mod welford;

pub use median::median;
pub use sample::{minimum_distance_sample, SampleMode, VoxelHashSampler};
pub use smooth::{smooth_elevation, smooth_surface, SmoothReport};
pub use spacing::{estimate_spacing, estimate_spacing_with_rng, SPACING_SAMPLES};
pub use statistical_outlier::{mean_neighbor_distances, statistical_outlier_removal, OutlierReport};
pub use welford::RunningStats;
