use fpcfilter_core::{ensure_positive, PointCloud, Result};
use hashbrown::HashMap;
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};

type VoxelKey = (i32, i32, i32);

/// How the minimum-distance sampler walks the cloud.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleMode {
    /// One thread, input order. The output is fully deterministic.
    #[default]
    Sequential,
    /// All worker threads share the voxel map behind a single mutex. The
    /// output keeps input order, but which points survive a conflict
    /// depends on scheduling.
    Parallel,
}

/// Greedy minimum-distance decimation on a hashed 3D grid.
///
/// Accepted points are bucketed into cubic voxels of side
/// `2 * radius / sqrt(3)`. Two points closer than `radius` differ by less
/// than one voxel on every axis, so checking a point's own voxel and its 26
/// neighbours finds every conflict.
#[derive(Debug, Clone)]
pub struct VoxelHashSampler {
    radius_sq: f64,
    cell: f64,
    origin: [f64; 3],
    voxels: HashMap<VoxelKey, Vec<[f64; 3]>>,
    accepted: usize,
}

impl VoxelHashSampler {
    /// Create an empty sampler whose grid is anchored at `origin`.
    pub fn new(radius: f64, origin: [f64; 3]) -> Result<Self> {
        ensure_positive("sample radius", radius)?;
        Ok(Self {
            radius_sq: radius * radius,
            cell: 2.0 * radius / 3.0f64.sqrt(),
            origin,
            voxels: HashMap::new(),
            accepted: 0,
        })
    }

    pub fn cell_size(&self) -> f64 {
        self.cell
    }

    /// Number of points accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn voxel_of(&self, p: &[f64; 3]) -> VoxelKey {
        (
            ((p[0] - self.origin[0]) / self.cell).floor() as i32,
            ((p[1] - self.origin[1]) / self.cell).floor() as i32,
            ((p[2] - self.origin[2]) / self.cell).floor() as i32,
        )
    }

    fn violates(&self, key: &VoxelKey, p: &[f64; 3]) -> bool {
        self.voxels.get(key).is_some_and(|coords| {
            coords.iter().any(|c| {
                let dx = c[0] - p[0];
                let dy = c[1] - p[1];
                let dz = c[2] - p[2];
                dx * dx + dy * dy + dz * dz < self.radius_sq
            })
        })
    }

    /// Accept `p` unless an already accepted point lies closer than the
    /// radius. Returns whether it was accepted.
    pub fn try_insert(&mut self, p: [f64; 3]) -> bool {
        let key = self.voxel_of(&p);

        // The enclosing voxel is by far the most likely place for a conflict.
        if self.violates(&key, &p) {
            return false;
        }

        let (vx, vy, vz) = key;
        for xi in vx.saturating_sub(1)..=vx.saturating_add(1) {
            for yi in vy.saturating_sub(1)..=vy.saturating_add(1) {
                for zi in vz.saturating_sub(1)..=vz.saturating_add(1) {
                    let candidate = (xi, yi, zi);
                    if candidate != key && self.violates(&candidate, &p) {
                        return false;
                    }
                }
            }
        }

        self.voxels.entry(key).or_default().push(p);
        self.accepted += 1;
        true
    }
}

/// Decimate `cloud` so that no two remaining points are closer than
/// `radius`.
///
/// Points are considered in input order (in [`SampleMode::Sequential`]) and
/// a point is dropped when an earlier accepted point is within `radius`.
/// The grid origin is the first point of the cloud. Normals and attributes
/// follow their points.
pub fn minimum_distance_sample(
    cloud: &PointCloud,
    radius: f64,
    mode: SampleMode,
) -> Result<PointCloud> {
    ensure_positive("sample radius", radius)?;

    if cloud.is_empty() {
        return Ok(cloud.clone());
    }

    let start = Instant::now();
    let mut sampler = VoxelHashSampler::new(radius, cloud.point_f64(0))?;
    debug!(radius, cell = sampler.cell_size(), ?mode, "voxel sampler ready");

    let keep: Vec<bool> = match mode {
        SampleMode::Sequential => (0..cloud.len())
            .map(|i| sampler.try_insert(cloud.point_f64(i)))
            .collect(),
        SampleMode::Parallel => {
            // Check and insert must happen under one lock, otherwise two
            // threads could both accept a pair of points that conflict.
            // This serialises most of the work.
            let shared = Mutex::new(sampler);
            (0..cloud.len())
                .into_par_iter()
                .map(|i| {
                    let p = cloud.point_f64(i);
                    shared.lock().try_insert(p)
                })
                .collect()
        }
    };

    let sampled = cloud.retain_mask(&keep);
    info!(
        before = cloud.len(),
        after = sampled.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "minimum distance sampling done"
    );

    Ok(sampled)
}
