use crate::median::median;
use fpcfilter_core::{ensure_positive, FilterError, PointCloud, Result};
use fpcfilter_spatial::KdTree;
use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};

/// Outcome of one smoothing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SmoothReport {
    /// Points whose coordinates changed.
    pub adjusted: usize,
}

/// Move every point along its own normal by the median offset of its
/// neighbours.
///
/// For each neighbour within `radius`, the offset from the point is split
/// into a component along the normal and an orthogonal remainder. Only
/// neighbours whose squared orthogonal distance is within
/// `(bin_scale * radius)^2` contribute, which keeps samples from a crossing
/// surface out of the median. The point itself always qualifies with a zero
/// projection.
///
/// All new positions are computed from the unmodified cloud before any
/// point is moved. Normals are used as stored and should be unit length.
///
/// # Errors
///
/// [`FilterError::MissingNormals`] when the cloud has no normals, and
/// [`FilterError::InvalidParameter`] for a non-positive radius or bin scale.
pub fn smooth_surface(cloud: &mut PointCloud, radius: f64, bin_scale: f64) -> Result<SmoothReport> {
    ensure_positive("smooth radius", radius)?;
    ensure_positive("bin scale", bin_scale)?;
    let Some(normals) = cloud.normals.as_ref() else {
        return Err(FilterError::MissingNormals);
    };

    let start = Instant::now();
    let tree = KdTree::build(cloud);
    let bin_radius_sq = (bin_scale * radius).powi(2);
    debug!(radius, bin_scale, points = tree.len(), "surface smoothing index ready");

    let snapshot: &PointCloud = cloud;
    let moved: Vec<Option<[f64; 3]>> = (0..snapshot.len())
        .into_par_iter()
        .map(|i| {
            let p = snapshot.point_f64(i);
            let n = normals.get(i).map(f64::from);

            let mut projections: Vec<f64> = tree
                .radius_search(&p, radius)
                .into_iter()
                .filter_map(|nn| {
                    let q = snapshot.point_f64(nn.index);
                    let off = [q[0] - p[0], q[1] - p[1], q[2] - p[2]];
                    let projection = n[0] * off[0] + n[1] * off[1] + n[2] * off[2];
                    let orthogonal_sq = nn.distance_sq - projection * projection;
                    (orthogonal_sq <= bin_radius_sq).then_some(projection)
                })
                .collect();

            let offset = median(&mut projections).filter(|m| *m != 0.0 && m.is_finite())?;
            Some([p[0] + n[0] * offset, p[1] + n[1] * offset, p[2] + n[2] * offset])
        })
        .collect();

    let mut adjusted = 0;
    for (i, position) in moved.into_iter().enumerate() {
        let Some([x, y, z]) = position else { continue };
        cloud.x[i] = x as f32;
        cloud.y[i] = y as f32;
        cloud.z[i] = z as f32;
        adjusted += 1;
    }

    info!(
        points = cloud.len(),
        adjusted,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "surface smoothing done"
    );
    Ok(SmoothReport { adjusted })
}

/// Replace each point's z with the median z of its neighbours within
/// `radius` (the point included).
///
/// New elevations are computed from the unmodified cloud and applied
/// afterwards. Points with no neighbours, such as non-finite ones, keep
/// their z.
pub fn smooth_elevation(cloud: &mut PointCloud, radius: f64) -> Result<SmoothReport> {
    ensure_positive("smooth radius", radius)?;

    let start = Instant::now();
    let tree = KdTree::build(cloud);
    debug!(radius, points = tree.len(), "elevation smoothing index ready");

    let snapshot: &PointCloud = cloud;
    let elevations: Vec<Option<f64>> = (0..snapshot.len())
        .into_par_iter()
        .map(|i| {
            let mut zs: Vec<f64> = tree
                .radius_search(&snapshot.point_f64(i), radius)
                .into_iter()
                .map(|nn| f64::from(snapshot.z[nn.index]))
                .collect();
            median(&mut zs)
        })
        .collect();

    let mut adjusted = 0;
    for (z, new_z) in cloud.z.iter_mut().zip(elevations) {
        let Some(new_z) = new_z else { continue };
        let new_z = new_z as f32;
        if new_z != *z {
            *z = new_z;
            adjusted += 1;
        }
    }

    info!(
        points = cloud.len(),
        adjusted,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "elevation smoothing done"
    );
    Ok(SmoothReport { adjusted })
}

#[cfg(test)]
mod tests {
    use super::{smooth_elevation, smooth_surface};
    use fpcfilter_core::{FilterError, Normals, PointCloud};

    fn plane_with_bump(bump: f32) -> (PointCloud, usize) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        let mut z = Vec::new();
        let mut center = 0;
        for i in 0..5 {
            for j in 0..5 {
                if i == 2 && j == 2 {
                    center = x.len();
                    z.push(bump);
                } else {
                    z.push(0.0);
                }
                x.push(i as f32 * 0.5);
                y.push(j as f32 * 0.5);
            }
        }
        let n = x.len();
        let mut cloud = PointCloud::from_xyz(x, y, z);
        cloud.set_normals(Normals {
            nx: vec![0.0; n],
            ny: vec![0.0; n],
            nz: vec![1.0; n],
        });
        (cloud, center)
    }

    #[test]
    fn elevation_takes_neighbourhood_median() {
        let mut cloud = PointCloud::from_xyz(
            vec![0.0, 1.0, 2.0, 3.0, 4.0],
            vec![0.0; 5],
            vec![1.0, 2.0, 3.0, 4.0, 100.0],
        );
        let report = smooth_elevation(&mut cloud, 200.0).unwrap();
        assert_eq!(cloud.z, vec![3.0; 5]);
        assert_eq!(report.adjusted, 4);
        assert_eq!(cloud.x, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn elevation_uses_original_values() {
        // Sequential in-place updates would drift; the pass must read the
        // snapshot only.
        let mut cloud =
            PointCloud::from_xyz(vec![0.0, 1.0, 2.0], vec![0.0; 3], vec![0.0, 0.9, 0.0]);
        smooth_elevation(&mut cloud, 1.5).unwrap();
        // 0: {0, 0.9} -> 0.45; 1: {0, 0.9, 0} -> 0; 2: {0.9, 0} -> 0.45
        assert_eq!(cloud.z, vec![0.45, 0.0, 0.45]);
    }

    #[test]
    fn isolated_point_keeps_elevation() {
        let mut cloud = PointCloud::from_xyz(vec![0.0, 50.0], vec![0.0; 2], vec![1.0, 7.0]);
        let report = smooth_elevation(&mut cloud, 1.0).unwrap();
        assert_eq!(cloud.z, vec![1.0, 7.0]);
        assert_eq!(report.adjusted, 0);
    }

    #[test]
    fn surface_pulls_bump_back_onto_plane() {
        let (mut cloud, center) = plane_with_bump(0.5);
        let report = smooth_surface(&mut cloud, 1.5, 0.5).unwrap();
        assert_eq!(cloud.z[center], 0.0);
        assert_eq!(report.adjusted, 1);
        assert!(cloud.z.iter().all(|z| *z == 0.0));
        // Only moves along the normal.
        assert_eq!(cloud.x[center], 1.0);
        assert_eq!(cloud.y[center], 1.0);
    }

    #[test]
    fn surface_ignores_neighbours_outside_bin() {
        // With a tiny bin only the point itself qualifies, so nothing moves.
        let (mut cloud, center) = plane_with_bump(0.5);
        let report = smooth_surface(&mut cloud, 1.5, 0.01).unwrap();
        assert_eq!(cloud.z[center], 0.5);
        assert_eq!(report.adjusted, 0);
    }

    #[test]
    fn surface_requires_normals() {
        let mut cloud = PointCloud::from_xyz(vec![0.0, 1.0], vec![0.0; 2], vec![0.0; 2]);
        let before = cloud.clone();
        let err = smooth_surface(&mut cloud, 1.0, 0.5).unwrap_err();
        assert!(matches!(err, FilterError::MissingNormals));
        assert!(err.is_recoverable());
        assert_eq!(cloud, before);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let (mut cloud, _) = plane_with_bump(0.0);
        assert!(smooth_surface(&mut cloud, 0.0, 0.5).is_err());
        assert!(smooth_surface(&mut cloud, 1.0, -1.0).is_err());
        assert!(smooth_elevation(&mut cloud, f64::INFINITY).is_err());
    }
}
