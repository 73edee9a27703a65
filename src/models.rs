//! Geometric models produced by the minimal solvers.

use nalgebra::{Matrix3, Matrix4, Vector3};

/// Fundamental matrix relating two pinhole views: `x2ᵗ F x1 = 0`.
#[derive(Clone, Debug, PartialEq)]
pub struct FundamentalMatrix {
    pub f: Matrix3<f64>,
}

impl FundamentalMatrix {
    pub fn new(f: Matrix3<f64>) -> Self {
        Self { f }
    }

    /// Epipolar line `F x1` in the second image.
    pub fn epipolar_line(&self, x1: &Vector3<f64>) -> Vector3<f64> {
        self.f * x1
    }

    /// Copy scaled to unit Frobenius norm with a non-negative largest entry,
    /// which makes two estimates of the same matrix directly comparable.
    pub fn normalized(&self) -> Self {
        let norm = self.f.norm();
        if norm == 0.0 {
            return self.clone();
        }
        let mut f = self.f / norm;
        let pivot = f.iter().fold(0.0_f64, |m, &v| if v.abs() > m.abs() { v } else { m });
        if pivot < 0.0 {
            f = -f;
        }
        Self { f }
    }
}

/// Similarity transform `x ↦ s·R·x + t`, stored as the homogeneous matrix
/// `[s·R | t; 0 0 0 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Similarity {
    pub matrix: Matrix4<f64>,
}

impl Similarity {
    pub fn new(matrix: Matrix4<f64>) -> Self {
        Self { matrix }
    }

    /// Build the transform from its scale, translation and rotation.
    pub fn from_parts(scale: f64, translation: &Vector3<f64>, rotation: &Matrix3<f64>) -> Self {
        Self::new(compose_rts(scale, translation, rotation))
    }

    /// Split into `(scale, translation, rotation)`; `None` if the matrix is
    /// not a proper, non-degenerate similarity.
    pub fn parts(&self) -> Option<(f64, Vector3<f64>, Matrix3<f64>)> {
        decompose_rts(&self.matrix)
    }

    /// Apply the transform to a point.
    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        let sr = self.matrix.fixed_view::<3, 3>(0, 0);
        let t = self.matrix.fixed_view::<3, 1>(0, 3);
        sr * p + t
    }
}

/// Compose the 4x4 similarity matrix `[s·R | t; 0 0 0 1]`.
pub fn compose_rts(scale: f64, translation: &Vector3<f64>, rotation: &Matrix3<f64>) -> Matrix4<f64> {
    let mut m = Matrix4::identity();
    m.fixed_view_mut::<3, 3>(0, 0).copy_from(&(rotation * scale));
    m.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
    m
}

/// Decompose a 4x4 similarity matrix into `(scale, translation, rotation)`.
///
/// Fails when the linear block has a negative determinant (a reflection),
/// when the recovered scale is below machine epsilon (all points collapsed
/// onto one) or when any entry is not finite.
pub fn decompose_rts(m: &Matrix4<f64>) -> Option<(f64, Vector3<f64>, Matrix3<f64>)> {
    if m.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let block: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();
    let det = block.determinant();
    if det < 0.0 {
        return None;
    }
    let scale = det.cbrt();
    if scale < f64::EPSILON {
        return None;
    }

    let rotation = block / scale;
    let translation: Vector3<f64> = m.fixed_view::<3, 1>(0, 3).into_owned();
    Some((scale, translation, rotation))
}
