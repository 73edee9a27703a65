//! Synthetic scenes shared by the unit tests.

use nalgebra::{Matrix3, Rotation3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::Similarity;
use crate::types::DataMatrix;

/// Pinhole intrinsics for a 640x480 image.
pub fn pixel_intrinsics() -> Matrix3<f64> {
    Matrix3::new(500.0, 0.0, 320.0, 0.0, 500.0, 240.0, 0.0, 0.0, 1.0)
}

pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Exact correspondences between two views sharing the intrinsics `k`, with
/// the ground-truth fundamental matrix.
pub fn two_view_scene(n: usize, seed: u64, k: &Matrix3<f64>) -> (DataMatrix, DataMatrix, Matrix3<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let rotation = *Rotation3::from_euler_angles(0.05, -0.2, 0.1).matrix();
    let translation = Vector3::new(1.0, 0.1, 0.2);

    let mut x1 = DataMatrix::zeros(2, n);
    let mut x2 = DataMatrix::zeros(2, n);
    for i in 0..n {
        let p = Vector3::new(
            rng.gen_range(-2.0..2.0),
            rng.gen_range(-1.5..1.5),
            rng.gen_range(4.0..8.0),
        );
        let q = rotation * p + translation;
        let a = k * p;
        let b = k * q;
        x1[(0, i)] = a.x / a.z;
        x1[(1, i)] = a.y / a.z;
        x2[(0, i)] = b.x / b.z;
        x2[(1, i)] = b.y / b.z;
    }

    let k_inv = k.try_inverse().unwrap();
    let f = k_inv.transpose() * skew(&translation) * rotation * k_inv;
    (x1, x2, f)
}

/// Random 3-D points and their exact image under a fixed similarity.
pub fn similarity_scene(n: usize, seed: u64) -> (DataMatrix, DataMatrix, Similarity) {
    let mut rng = StdRng::seed_from_u64(seed);
    let rotation = *Rotation3::from_euler_angles(0.4, -0.3, 1.2).matrix();
    let sim = Similarity::from_parts(1.7, &Vector3::new(0.5, -2.0, 3.0), &rotation);

    let mut x1 = DataMatrix::zeros(3, n);
    let mut x2 = DataMatrix::zeros(3, n);
    for i in 0..n {
        let p = Vector3::new(
            rng.gen_range(-5.0..5.0),
            rng.gen_range(-5.0..5.0),
            rng.gen_range(-5.0..5.0),
        );
        let q = sim.transform_point(&p);
        x1.column_mut(i).copy_from(&p);
        x2.column_mut(i).copy_from(&q);
    }
    (x1, x2, sim)
}
