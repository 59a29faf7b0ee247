use crate::spacing::estimate_spacing;
use crate::welford::RunningStats;
use fpcfilter_core::{FilterError, PointCloud, Result};
use fpcfilter_spatial::KdTree;
use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};

/// Summary of one statistical outlier pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutlierReport {
    /// Mean of the per-point mean neighbour distances.
    pub mean: f64,
    /// Sample standard deviation of the same values, 0 when undefined.
    pub stddev: f64,
    /// Points with a mean neighbour distance at or above this were removed.
    pub threshold: f64,
    pub removed: usize,
    /// Most common nearest-neighbour distance, measured before removal.
    pub estimated_spacing: Option<f64>,
}

/// Mean distance from every point to its `mean_k` nearest other points.
///
/// Each point asks the tree for `mean_k + 1` neighbours; the first result is
/// the point itself and is skipped. The mean is updated incrementally
/// (`mean += (d - mean) / count`). Points with non-finite coordinates get
/// `f64::INFINITY`.
pub fn mean_neighbor_distances(cloud: &PointCloud, tree: &KdTree, mean_k: usize) -> Vec<f64> {
    (0..cloud.len())
        .into_par_iter()
        .map(|i| {
            let q = cloud.point_f64(i);
            if !q.iter().all(|v| v.is_finite()) {
                return f64::INFINITY;
            }

            let neighbours = tree.knn(&q, mean_k.saturating_add(1));
            let mut mean = 0.0;
            for (count, nn) in neighbours.iter().enumerate().skip(1) {
                mean += (nn.distance_sq.sqrt() - mean) / count as f64;
            }
            mean
        })
        .collect()
}

/// Remove points whose mean neighbour distance is unusually large.
///
/// The threshold is `mean + std_multiplier * stddev` over all per-point mean
/// distances; points strictly below it are kept. With fewer than two finite
/// values the standard deviation is undefined and nothing is removed. A
/// multiplier of 0 removes everything at or above the mean.
///
/// Also estimates the point spacing of the input cloud, reported alongside.
pub fn statistical_outlier_removal(
    cloud: &PointCloud,
    std_multiplier: f64,
    mean_k: usize,
) -> Result<(PointCloud, OutlierReport)> {
    if !std_multiplier.is_finite() || std_multiplier < 0.0 {
        return Err(FilterError::invalid(
            "std multiplier",
            format!("must be a finite value >= 0, got {std_multiplier}"),
        ));
    }
    if mean_k < 1 {
        return Err(FilterError::invalid("mean k", "must be at least 1"));
    }

    if cloud.is_empty() {
        let report = OutlierReport {
            mean: 0.0,
            stddev: 0.0,
            threshold: f64::INFINITY,
            removed: 0,
            estimated_spacing: None,
        };
        return Ok((cloud.clone(), report));
    }

    let start = Instant::now();
    let tree = KdTree::build(cloud);
    debug!(
        points = tree.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "built index"
    );

    let distances = mean_neighbor_distances(cloud, &tree, mean_k);

    // Sequential on purpose: a shared accumulator must not be updated from
    // several threads.
    let stats: RunningStats = distances.iter().copied().filter(|d| d.is_finite()).collect();

    let mean = stats.mean().unwrap_or(0.0);
    let (stddev, threshold) = match stats.sample_stddev() {
        Some(stddev) => (stddev, mean + std_multiplier * stddev),
        None => (0.0, f64::INFINITY),
    };
    debug!(mean, stddev, threshold, "mean neighbour distance statistics");

    let keep: Vec<bool> = distances.iter().map(|&d| d < threshold).collect();
    let filtered = cloud.retain_mask(&keep);

    let estimated_spacing = estimate_spacing(cloud, &tree);

    let report = OutlierReport {
        mean,
        stddev,
        threshold,
        removed: cloud.len() - filtered.len(),
        estimated_spacing,
    };

    info!(
        before = cloud.len(),
        after = filtered.len(),
        threshold,
        spacing = ?estimated_spacing,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "statistical outlier removal done"
    );

    Ok((filtered, report))
}
