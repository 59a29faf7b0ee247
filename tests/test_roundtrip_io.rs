use fpcfilter::io::{read_ply, read_ply_with, write_ply};
use fpcfilter::{Normals, PointCloud, Polygon};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::tempdir;

fn random_cloud(n: usize, seed: u64, with_normals: bool) -> PointCloud {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut cloud = PointCloud::from_xyz(
        (0..n).map(|_| rng.gen_range(-500.0f32..500.0)).collect(),
        (0..n).map(|_| rng.gen_range(-500.0f32..500.0)).collect(),
        (0..n).map(|_| rng.gen_range(0.0f32..80.0)).collect(),
    );
    for i in 0..n {
        cloud.colors.r[i] = rng.gen();
        cloud.colors.g[i] = rng.gen();
        cloud.colors.b[i] = rng.gen();
        cloud.views[i] = rng.gen_range(1..20);
    }
    if with_normals {
        cloud.set_normals(Normals {
            nx: (0..n).map(|_| rng.gen_range(-1.0f32..1.0)).collect(),
            ny: (0..n).map(|_| rng.gen_range(-1.0f32..1.0)).collect(),
            nz: (0..n).map(|_| rng.gen_range(-1.0f32..1.0)).collect(),
        });
    }
    cloud
}

#[test]
fn ply_write_then_read_roundtrip_with_normals() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("roundtrip.ply");
    let cloud = random_cloud(5000, 11, true);

    write_ply(&path, &cloud).unwrap();
    let loaded = read_ply(&path).unwrap();

    assert_eq!(loaded.len(), cloud.len());
    for i in 0..cloud.len() {
        assert_eq!(loaded.vertex(i), cloud.vertex(i), "point {i} differs");
    }
}

#[test]
fn ply_write_then_read_roundtrip_without_normals() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("plain.ply");
    let cloud = random_cloud(1000, 12, false);

    write_ply(&path, &cloud).unwrap();
    assert_eq!(read_ply(&path).unwrap(), cloud);
}

#[test]
fn cropped_read_matches_post_hoc_filter() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("site.ply");
    let cloud = random_cloud(3000, 13, true);
    write_ply(&path, &cloud).unwrap();

    let triangle = Polygon::new(vec![[-400.0, -400.0], [400.0, -300.0], [0.0, 450.0]]).unwrap();
    let inside = |p: [f32; 3]| triangle.contains(f64::from(p[0]), f64::from(p[1]));

    let cropped = read_ply_with(&path, inside).unwrap();
    let mask: Vec<bool> = cloud.iter_points().map(inside).collect();
    let expected = cloud.retain_mask(&mask);

    assert!(!cropped.is_empty());
    assert!(cropped.len() < cloud.len());
    assert_eq!(cropped, expected);
}

#[test]
fn empty_cloud_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.ply");
    write_ply(&path, &PointCloud::new()).unwrap();
    let loaded = read_ply(&path).unwrap();
    assert!(loaded.is_empty());
    assert!(!loaded.has_normals());
}
