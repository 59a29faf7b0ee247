use crate::Vertex;

/// A point cloud stored as parallel per-field arrays.
///
/// Positions, colors and view counts always have one entry per point.
/// Normals are a whole-cloud property: either every point has one
/// (`normals` is `Some` with the same length) or none does.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
    pub colors: Colors,
    pub views: Vec<u8>,
    pub normals: Option<Normals>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normals {
    pub nx: Vec<f32>,
    pub ny: Vec<f32>,
    pub nz: Vec<f32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Colors {
    pub r: Vec<u8>,
    pub g: Vec<u8>,
    pub b: Vec<u8>,
}

impl Normals {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            nx: Vec::with_capacity(n),
            ny: Vec::with_capacity(n),
            nz: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.nx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nx.is_empty()
    }

    pub fn get(&self, i: usize) -> [f32; 3] {
        [self.nx[i], self.ny[i], self.nz[i]]
    }
}

impl Colors {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            r: Vec::with_capacity(n),
            g: Vec::with_capacity(n),
            b: Vec::with_capacity(n),
        }
    }

    pub fn get(&self, i: usize) -> [u8; 3] {
        [self.r[i], self.g[i], self.b[i]]
    }
}

impl PointCloud {
    pub fn new() -> Self {
        Self::with_capacity(0, false)
    }

    /// An empty cloud whose points will carry normals.
    pub fn with_normals() -> Self {
        Self::with_capacity(0, true)
    }

    pub fn with_capacity(n: usize, has_normals: bool) -> Self {
        Self {
            x: Vec::with_capacity(n),
            y: Vec::with_capacity(n),
            z: Vec::with_capacity(n),
            colors: Colors::with_capacity(n),
            views: Vec::with_capacity(n),
            normals: has_normals.then(|| Normals::with_capacity(n)),
        }
    }

    /// Build a cloud from coordinates alone; colors and views are zeroed.
    pub fn from_xyz(x: Vec<f32>, y: Vec<f32>, z: Vec<f32>) -> Self {
        assert_eq!(x.len(), y.len(), "x and y must have same length");
        assert_eq!(x.len(), z.len(), "x and z must have same length");

        let n = x.len();
        Self {
            x,
            y,
            z,
            colors: Colors {
                r: vec![0; n],
                g: vec![0; n],
                b: vec![0; n],
            },
            views: vec![0; n],
            normals: None,
        }
    }

    /// Attach normals to every point.
    ///
    /// # Panics
    ///
    /// Panics if `normals` does not have exactly one entry per point.
    pub fn set_normals(&mut self, normals: Normals) {
        assert_eq!(normals.nx.len(), self.len(), "normals must match point count");
        assert_eq!(normals.ny.len(), self.len(), "normals must match point count");
        assert_eq!(normals.nz.len(), self.len(), "normals must match point count");
        self.normals = Some(normals);
    }

    pub fn len(&self) -> usize {
        debug_assert!(self.is_consistent());
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    /// Checks that every per-point array has the same length.
    pub fn is_consistent(&self) -> bool {
        let n = self.x.len();
        let base = self.y.len() == n
            && self.z.len() == n
            && self.colors.r.len() == n
            && self.colors.g.len() == n
            && self.colors.b.len() == n
            && self.views.len() == n;

        base && self.normals.as_ref().map_or(true, |nm| {
            nm.nx.len() == n && nm.ny.len() == n && nm.nz.len() == n
        })
    }

    pub fn point(&self, i: usize) -> [f32; 3] {
        [self.x[i], self.y[i], self.z[i]]
    }

    /// Position widened to `f64` for distance math.
    pub fn point_f64(&self, i: usize) -> [f64; 3] {
        [self.x[i] as f64, self.y[i] as f64, self.z[i] as f64]
    }

    pub fn iter_points(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.x
            .iter()
            .zip(&self.y)
            .zip(&self.z)
            .map(|((x, y), z)| [*x, *y, *z])
    }

    /// Contiguous `f64` copy of all positions.
    pub fn positions_f64(&self) -> Vec<[f64; 3]> {
        (0..self.x.len()).map(|i| self.point_f64(i)).collect()
    }

    pub fn vertex(&self, i: usize) -> Vertex {
        Vertex {
            position: self.point(i),
            normal: self.normals.as_ref().map(|n| n.get(i)),
            color: self.colors.get(i),
            views: self.views[i],
        }
    }

    /// Append one point.
    ///
    /// # Panics
    ///
    /// Panics if the vertex carries a normal and the cloud does not, or the
    /// other way around.
    pub fn push(&mut self, vertex: Vertex) {
        match (&mut self.normals, vertex.normal) {
            (Some(normals), Some([nx, ny, nz])) => {
                normals.nx.push(nx);
                normals.ny.push(ny);
                normals.nz.push(nz);
            }
            (None, None) => {}
            _ => panic!("vertex normal presence must match the cloud"),
        }

        let [x, y, z] = vertex.position;
        self.x.push(x);
        self.y.push(y);
        self.z.push(z);

        let [r, g, b] = vertex.color;
        self.colors.r.push(r);
        self.colors.g.push(g);
        self.colors.b.push(b);
        self.views.push(vertex.views);
    }

    /// Keep the points at `indices`, in that order.
    ///
    /// Positions, colors, views and normals all go through the same index
    /// list, so every attribute stays attached to its point.
    pub fn select(&self, indices: &[usize]) -> Self {
        let pick_f32 = |v: &[f32]| -> Vec<f32> { indices.iter().map(|&i| v[i]).collect() };
        let pick_u8 = |v: &[u8]| -> Vec<u8> { indices.iter().map(|&i| v[i]).collect() };

        let n = self.len();
        for &idx in indices {
            assert!(idx < n, "index out of bounds in select");
        }

        Self {
            x: pick_f32(&self.x),
            y: pick_f32(&self.y),
            z: pick_f32(&self.z),
            colors: Colors {
                r: pick_u8(&self.colors.r),
                g: pick_u8(&self.colors.g),
                b: pick_u8(&self.colors.b),
            },
            views: pick_u8(&self.views),
            normals: self.normals.as_ref().map(|n| Normals {
                nx: pick_f32(&n.nx),
                ny: pick_f32(&n.ny),
                nz: pick_f32(&n.nz),
            }),
        }
    }

    /// Keep the points whose flag is `true`, preserving order.
    pub fn retain_mask(&self, keep: &[bool]) -> Self {
        assert_eq!(keep.len(), self.len(), "mask must match point count");
        let indices: Vec<usize> = keep
            .iter()
            .enumerate()
            .filter_map(|(i, &k)| k.then_some(i))
            .collect();
        self.select(&indices)
    }
}

impl Default for PointCloud {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{Normals, PointCloud};
    use crate::Vertex;
    use proptest::prelude::*;

    fn vertex(x: f32, normal: Option<[f32; 3]>) -> Vertex {
        Vertex {
            position: [x, x + 10.0, x + 20.0],
            normal,
            color: [x as u8, x as u8 + 1, x as u8 + 2],
            views: x as u8 * 2,
        }
    }

    #[test]
    fn new_is_empty() {
        let cloud = PointCloud::new();
        assert!(cloud.is_empty());
        assert_eq!(cloud.len(), 0);
        assert!(!cloud.has_normals());
    }

    #[test]
    fn from_xyz_builds_cloud_with_zeroed_attributes() {
        let cloud = PointCloud::from_xyz(vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]);
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.point(0), [1.0, 3.0, 5.0]);
        assert_eq!(cloud.point(1), [2.0, 4.0, 6.0]);
        assert_eq!(cloud.views, vec![0, 0]);
        assert_eq!(cloud.colors.r, vec![0, 0]);
        assert!(cloud.is_consistent());
    }

    #[test]
    fn push_keeps_arrays_parallel() {
        let mut cloud = PointCloud::with_normals();
        cloud.push(vertex(1.0, Some([0.0, 0.0, 1.0])));
        cloud.push(vertex(2.0, Some([0.0, 1.0, 0.0])));
        assert_eq!(cloud.len(), 2);
        assert!(cloud.is_consistent());
        assert_eq!(cloud.vertex(1), vertex(2.0, Some([0.0, 1.0, 0.0])));
    }

    #[test]
    #[should_panic]
    fn push_rejects_normal_mismatch() {
        let mut cloud = PointCloud::new();
        cloud.push(vertex(1.0, Some([0.0, 0.0, 1.0])));
    }

    #[test]
    fn select_subsets_every_attribute() {
        let mut cloud = PointCloud::with_normals();
        for i in 0..4 {
            cloud.push(vertex(i as f32, Some([i as f32 * 0.1, 0.0, 1.0])));
        }
        let selected = cloud.select(&[3, 1]);
        assert_eq!(selected.x, vec![3.0, 1.0]);
        assert_eq!(selected.y, vec![13.0, 11.0]);
        assert_eq!(selected.views, vec![6, 2]);
        assert_eq!(selected.colors.g, vec![4, 2]);
        let normals = selected.normals.as_ref().unwrap();
        assert_eq!(normals.nx, vec![3.0f32 * 0.1, 1.0f32 * 0.1]);
        assert!(selected.is_consistent());
    }

    #[test]
    fn retain_mask_preserves_order() {
        let cloud = PointCloud::from_xyz(vec![0.0, 1.0, 2.0, 3.0], vec![0.0; 4], vec![0.0; 4]);
        let kept = cloud.retain_mask(&[true, false, true, true]);
        assert_eq!(kept.x, vec![0.0, 2.0, 3.0]);
    }

    #[test]
    fn set_normals_enables_normals() {
        let mut cloud = PointCloud::from_xyz(vec![0.0, 1.0], vec![0.0; 2], vec![0.0; 2]);
        cloud.set_normals(Normals {
            nx: vec![0.0; 2],
            ny: vec![0.0; 2],
            nz: vec![1.0; 2],
        });
        assert!(cloud.has_normals());
        assert!(cloud.is_consistent());
    }

    #[test]
    #[should_panic]
    fn set_normals_panics_on_length_mismatch() {
        let mut cloud = PointCloud::from_xyz(vec![0.0, 1.0], vec![0.0; 2], vec![0.0; 2]);
        cloud.set_normals(Normals {
            nx: vec![0.0],
            ny: vec![0.0],
            nz: vec![1.0],
        });
    }

    #[test]
    #[should_panic]
    fn from_xyz_panics_on_mismatch() {
        let _ = PointCloud::from_xyz(vec![1.0], vec![2.0, 3.0], vec![4.0]);
    }

    #[test]
    fn iter_points_yields_xyz_tuples() {
        let cloud = PointCloud::from_xyz(vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]);
        let pts: Vec<[f32; 3]> = cloud.iter_points().collect();
        assert_eq!(pts, vec![[1.0, 3.0, 5.0], [2.0, 4.0, 6.0]]);
        assert_eq!(cloud.positions_f64()[1], [2.0, 4.0, 6.0]);
    }

    proptest! {
        #[test]
        fn select_keeps_normals_attached(
            data in prop::collection::vec((-10.0f32..10.0f32, -1.0f32..1.0f32), 1..200),
            idxs in prop::collection::vec(0usize..200, 0..200)
        ) {
            let n = data.len();
            let mut cloud = PointCloud::with_normals();
            for (x, nx) in &data {
                cloud.push(Vertex {
                    position: [*x, 0.0, 0.0],
                    normal: Some([*nx, 0.0, 0.0]),
                    color: [0, 0, 0],
                    views: 0,
                });
            }
            let valid: Vec<usize> = idxs.into_iter().filter(|i| *i < n).collect();
            let out = cloud.select(&valid);
            prop_assert_eq!(out.len(), valid.len());
            prop_assert!(out.is_consistent());
            let normals = out.normals.as_ref().unwrap();
            for (k, &i) in valid.iter().enumerate() {
                prop_assert_eq!(out.x[k], data[i].0);
                prop_assert_eq!(normals.nx[k], data[i].1);
            }
        }
    }
}
