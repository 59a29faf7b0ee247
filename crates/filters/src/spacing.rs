use fpcfilter_core::PointCloud;
use fpcfilter_spatial::KdTree;
use hashbrown::HashMap;
use rand::Rng;
use rayon::prelude::*;

/// Maximum number of random draws used by [`estimate_spacing`].
pub const SPACING_SAMPLES: usize = 10_000;

/// Estimate the typical distance between a point and its nearest neighbour.
///
/// Up to [`SPACING_SAMPLES`] point indices are drawn uniformly with
/// replacement. Each drawn point's nearest-neighbour distance is rounded to
/// the nearest centimetre-sized bucket (`round(d * 100)`), and the most
/// frequent bucket, divided by 100, is returned. Ties go to the smaller
/// bucket.
///
/// Returns `None` when the cloud has fewer than two points. `tree` must
/// have been built from `cloud`.
pub fn estimate_spacing(cloud: &PointCloud, tree: &KdTree) -> Option<f64> {
    estimate_spacing_with_rng(cloud, tree, &mut rand::thread_rng())
}

/// Same as [`estimate_spacing`] but draws from the given generator, so
/// results are reproducible with a seeded RNG.
pub fn estimate_spacing_with_rng<R: Rng + ?Sized>(
    cloud: &PointCloud,
    tree: &KdTree,
    rng: &mut R,
) -> Option<f64> {
    let n = cloud.len();
    if n < 2 {
        return None;
    }

    let draws: Vec<usize> = (0..n.min(SPACING_SAMPLES))
        .map(|_| rng.gen_range(0..n))
        .collect();

    // Two neighbours: the point itself and its closest other point.
    let buckets: Vec<Option<i64>> = draws
        .par_iter()
        .map(|&i| {
            tree.knn(&cloud.point_f64(i), 2)
                .get(1)
                .map(|nn| (nn.distance_sq.sqrt() * 100.0).round() as i64)
        })
        .collect();

    let mut histogram: HashMap<i64, usize> = HashMap::new();
    for bucket in buckets.into_iter().flatten() {
        *histogram.entry(bucket).or_default() += 1;
    }

    histogram
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(bucket, _)| bucket as f64 / 100.0)
}

#[cfg(test)]
mod tests {
    use super::estimate_spacing_with_rng;
    use fpcfilter_core::PointCloud;
    use fpcfilter_spatial::KdTree;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn grid(step: f32, n: usize) -> PointCloud {
        let mut x = Vec::new();
        let mut y = Vec::new();
        let mut z = Vec::new();
        for i in 0..n {
            for j in 0..n {
                x.push(i as f32 * step);
                y.push(j as f32 * step);
                z.push((i * n + j) as f32 * 1e-6);
            }
        }
        PointCloud::from_xyz(x, y, z)
    }

    #[test]
    fn regular_grid_spacing() {
        let cloud = grid(0.25, 30);
        let tree = KdTree::build(&cloud);
        let mut rng = StdRng::seed_from_u64(7);
        let spacing = estimate_spacing_with_rng(&cloud, &tree, &mut rng).unwrap();
        assert!((spacing - 0.25).abs() < 1e-9, "got {spacing}");
    }

    #[test]
    fn same_seed_same_answer() {
        let cloud = grid(0.1, 20);
        let tree = KdTree::build(&cloud);
        let a = estimate_spacing_with_rng(&cloud, &tree, &mut StdRng::seed_from_u64(1));
        let b = estimate_spacing_with_rng(&cloud, &tree, &mut StdRng::seed_from_u64(1));
        assert_eq!(a, b);
    }

    #[test]
    fn too_few_points() {
        let cloud = PointCloud::from_xyz(vec![1.0], vec![1.0], vec![1.0]);
        let tree = KdTree::build(&cloud);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(estimate_spacing_with_rng(&cloud, &tree, &mut rng), None);
        assert_eq!(
            estimate_spacing_with_rng(&PointCloud::new(), &KdTree::build(&PointCloud::new()), &mut rng),
            None
        );
    }
}
