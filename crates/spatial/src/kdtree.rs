use fpcfilter_core::PointCloud;
use kiddo::float::distance::SquaredEuclidean;
use kiddo::immutable::float::kdtree::ImmutableKdTree;
use std::num::NonZero;

/// A neighbour found by a [`KdTree`] query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbour {
    /// Index of the point in the cloud the tree was built from.
    pub index: usize,
    /// Squared Euclidean distance to the query, in `f64`.
    pub distance_sq: f64,
}

/// A KdTree for nearest-neighbour and radius queries on 3D point clouds.
///
/// Built on top of kiddo v5's `ImmutableKdTree` over `f64` coordinates, so
/// squared distances are accumulated in double precision even though the
/// cloud stores `f32`. The tree holds its own copy of the positions: it
/// describes the cloud as it was at build time and must be rebuilt after
/// the point set changes.
///
/// Points with a non-finite coordinate are left out of the tree and are
/// never returned by a query.
///
/// The tree is read-only once built and can be queried from many threads.
#[derive(Debug, Clone)]
pub struct KdTree {
    tree: ImmutableKdTree<f64, u32, 3, 32>,
    num_points: usize,
    /// Cloud index of each tree item, when some points were left out.
    ids: Option<Vec<usize>>,
}

fn is_finite_point(p: &[f64; 3]) -> bool {
    p.iter().all(|v| v.is_finite())
}

impl KdTree {
    /// Build a KdTree from a PointCloud.
    pub fn build(cloud: &PointCloud) -> Self {
        Self::from_points(&cloud.positions_f64())
    }

    /// Build a KdTree from a contiguous slice of positions.
    ///
    /// # Panics
    ///
    /// Panics if there are more than `u32::MAX` points.
    pub fn from_points(points: &[[f64; 3]]) -> Self {
        assert!(
            points.len() <= u32::MAX as usize,
            "KdTree supports at most u32::MAX points"
        );

        if points.iter().all(is_finite_point) {
            return Self {
                tree: ImmutableKdTree::new_from_slice(points),
                num_points: points.len(),
                ids: None,
            };
        }

        let (ids, finite): (Vec<usize>, Vec<[f64; 3]>) = points
            .iter()
            .enumerate()
            .filter(|(_, p)| is_finite_point(p))
            .map(|(i, p)| (i, *p))
            .unzip();

        Self {
            tree: ImmutableKdTree::new_from_slice(&finite),
            num_points: finite.len(),
            ids: Some(ids),
        }
    }

    fn cloud_index(&self, item: u32) -> usize {
        match &self.ids {
            Some(ids) => ids[item as usize],
            None => item as usize,
        }
    }

    /// Returns the number of indexed (finite) points.
    pub fn len(&self) -> usize {
        self.num_points
    }

    /// Returns true if the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.num_points == 0
    }

    /// Find the `k` nearest neighbours to `query`, nearest first.
    ///
    /// When the query is itself a point of the tree it comes back as one of
    /// the results at distance 0.
    ///
    /// Edge cases:
    /// - Returns empty if `k == 0`, the tree is empty, or the query is not
    ///   finite.
    /// - If `k > len()`, returns all points.
    pub fn knn(&self, query: &[f64; 3], k: usize) -> Vec<Neighbour> {
        // kiddo reserves `k` result slots up front.
        let Some(nz_k) = NonZero::new(k.min(self.num_points)) else {
            return Vec::new();
        };
        if !is_finite_point(query) {
            return Vec::new();
        }

        self.tree
            .nearest_n::<SquaredEuclidean>(query, nz_k)
            .into_iter()
            .map(|nn| Neighbour {
                index: self.cloud_index(nn.item),
                distance_sq: nn.distance,
            })
            .collect()
    }

    /// Find all points within `radius` (Euclidean distance) of `query`.
    ///
    /// Returns every point with `distance <= radius`, in no particular order.
    ///
    /// Edge cases:
    /// - Returns empty if radius <= 0, radius is non-finite, the tree is
    ///   empty, or the query is not finite.
    pub fn radius_search(&self, query: &[f64; 3], radius: f64) -> Vec<Neighbour> {
        if self.is_empty()
            || radius <= 0.0
            || !radius.is_finite()
            || !is_finite_point(query)
        {
            return Vec::new();
        }

        let radius_sq = radius * radius;

        // kiddo's `within_unsorted` uses strict `<`. To include points
        // exactly on the boundary (dist == radius), we query with a tiny
        // epsilon added, then post-filter with `<=`.
        let query_radius_sq = radius_sq + f64::EPSILON * radius_sq.max(1.0);

        self.tree
            .within_unsorted::<SquaredEuclidean>(query, query_radius_sq)
            .into_iter()
            .filter(|nn| nn.distance <= radius_sq)
            .map(|nn| Neighbour {
                index: self.cloud_index(nn.item),
                distance_sq: nn.distance,
            })
            .collect()
    }
}
