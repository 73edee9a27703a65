//! Similarity (scale, rotation, translation) between two 3-D point sets
//! using Umeyama's closed form.
//!
//! "Least-squares estimation of transformation parameters between two point
//! patterns", S. Umeyama, PAMI 1991.

use nalgebra::{Matrix3, Matrix4, SVD, Vector3};

use crate::core::Solver;
use crate::models::{Similarity, compose_rts, decompose_rts};
use crate::types::DataMatrix;

fn point(x: &DataMatrix, i: usize) -> Vector3<f64> {
    Vector3::new(x[(0, i)], x[(1, i)], x[(2, i)])
}

fn centroid(x: &DataMatrix) -> Vector3<f64> {
    let n = x.ncols() as f64;
    (0..x.ncols()).fold(Vector3::zeros(), |acc, i| acc + point(x, i)) / n
}

/// Least-squares similarity mapping the columns of `x1` onto those of `x2`,
/// as a 4x4 homogeneous matrix.
///
/// The rotation is always proper: a reflection in the optimal orthogonal
/// map is removed by flipping its weakest singular direction. The scale is
/// zero when `x1` collapses onto a single point, which makes the result fail
/// [`decompose_rts`]. Returns `None` for fewer than three points, mismatched
/// shapes or a failed decomposition.
pub fn umeyama(x1: &DataMatrix, x2: &DataMatrix) -> Option<Matrix4<f64>> {
    let n = x1.ncols();
    if n < 3 || x1.nrows() != 3 || x2.nrows() != 3 || x2.ncols() != n {
        return None;
    }

    let mean1 = centroid(x1);
    let mean2 = centroid(x2);

    let mut covariance = Matrix3::<f64>::zeros();
    let mut variance1 = 0.0;
    for i in 0..n {
        let p1 = point(x1, i) - mean1;
        let p2 = point(x2, i) - mean2;
        covariance += p2 * p1.transpose();
        variance1 += p1.norm_squared();
    }
    covariance /= n as f64;
    variance1 /= n as f64;

    if covariance.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let svd = SVD::new(covariance, true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let d = svd.singular_values;

    let mut s = Vector3::new(1.0, 1.0, 1.0);
    if u.determinant() * v_t.determinant() < 0.0 {
        let mut weakest = 0;
        for i in 1..3 {
            if d[i] < d[weakest] {
                weakest = i;
            }
        }
        s[weakest] = -1.0;
    }

    let rotation = u * Matrix3::from_diagonal(&s) * v_t;
    let spread = variance1.sqrt();
    let scale = if spread > 1e-12 * (1.0 + mean1.norm()) {
        d.dot(&s) / variance1
    } else {
        0.0
    };
    let translation = mean2 - rotation * mean1 * scale;

    Some(compose_rts(scale, &translation, &rotation))
}

/// Non-robust similarity from all correspondences.
///
/// Returns `(scale, translation, rotation)` such that
/// `x2 ≈ scale · rotation · x1 + translation`, or `None` when the data is
/// degenerate.
pub fn find_rts(x1: &DataMatrix, x2: &DataMatrix) -> Option<(f64, Vector3<f64>, Matrix3<f64>)> {
    umeyama(x1, x2).and_then(|m| decompose_rts(&m))
}

/// Minimal solver wrapping [`umeyama`]. Degenerate samples yield no
/// candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UmeyamaSolver;

impl Solver for UmeyamaSolver {
    type Model = Similarity;

    fn point_dimension(&self) -> usize {
        3
    }

    fn sample_size(&self) -> usize {
        3
    }

    fn max_models(&self) -> usize {
        1
    }

    fn solve(&self, x1: &DataMatrix, x2: &DataMatrix) -> Vec<Similarity> {
        umeyama(x1, x2)
            .filter(|m| decompose_rts(m).is_some())
            .map(Similarity::new)
            .into_iter()
            .collect()
    }
}
