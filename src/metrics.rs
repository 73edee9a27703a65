//! Residuals of a model for a single correspondence.
//!
//! Metrics flagged `SQUARED = false` return a distance (possibly signed) and
//! are squared by the kernel before scoring.

use nalgebra::{DVectorView, Vector3};

use crate::core::ErrorMetric;
use crate::models::{FundamentalMatrix, Similarity};

fn point3(p: DVectorView<'_, f64>) -> Vector3<f64> {
    Vector3::new(p[0], p[1], p[2])
}

fn homogeneous(p: DVectorView<'_, f64>) -> Vector3<f64> {
    Vector3::new(p[0], p[1], 1.0)
}

/// Epipolar metrics whose residual is a distance to a line in an image.
/// Only these are accepted by [`crate::kernel::fundamental_kernel`], whose
/// NFA constants assume a point-to-line residual.
pub trait EpipolarMetric: ErrorMetric<FundamentalMatrix> {}

/// `‖s·R·p1 + t − p2‖`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RtsResidualError;

impl ErrorMetric<Similarity> for RtsResidualError {
    const SQUARED: bool = false;

    fn error(&self, model: &Similarity, p1: DVectorView<'_, f64>, p2: DVectorView<'_, f64>) -> f64 {
        (model.transform_point(&point3(p1)) - point3(p2)).norm()
    }
}

/// `‖s·R·p1 + t − p2‖²`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RtsSquaredResidualError;

impl ErrorMetric<Similarity> for RtsSquaredResidualError {
    const SQUARED: bool = true;

    fn error(&self, model: &Similarity, p1: DVectorView<'_, f64>, p2: DVectorView<'_, f64>) -> f64 {
        (model.transform_point(&point3(p1)) - point3(p2)).norm_squared()
    }
}

/// Squared distance from `p2` to the epipolar line `F·p1`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EpipolarDistanceError;

impl ErrorMetric<FundamentalMatrix> for EpipolarDistanceError {
    const SQUARED: bool = true;

    fn error(&self, model: &FundamentalMatrix, p1: DVectorView<'_, f64>, p2: DVectorView<'_, f64>) -> f64 {
        let line = model.epipolar_line(&homogeneous(p1));
        let d = homogeneous(p2).dot(&line);
        let norm = line.x * line.x + line.y * line.y;
        if norm == 0.0 {
            return f64::INFINITY;
        }
        d * d / norm
    }
}

impl EpipolarMetric for EpipolarDistanceError {}

/// Sum of the squared distances of each point to the epipolar line of the
/// other.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SymmetricEpipolarDistanceError;

impl ErrorMetric<FundamentalMatrix> for SymmetricEpipolarDistanceError {
    const SQUARED: bool = true;

    fn error(&self, model: &FundamentalMatrix, p1: DVectorView<'_, f64>, p2: DVectorView<'_, f64>) -> f64 {
        let x1 = homogeneous(p1);
        let x2 = homogeneous(p2);
        let l2 = model.f * x1;
        let l1 = model.f.transpose() * x2;
        let d = x2.dot(&l2);

        let n1 = l1.x * l1.x + l1.y * l1.y;
        let n2 = l2.x * l2.x + l2.y * l2.y;
        if n1 == 0.0 || n2 == 0.0 {
            return f64::INFINITY;
        }
        d * d * (1.0 / n1 + 1.0 / n2)
    }
}

impl EpipolarMetric for SymmetricEpipolarDistanceError {}

/// Signed Sampson distance: the epipolar constraint divided by the norm of
/// its gradient with respect to both points.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SampsonError;

impl ErrorMetric<FundamentalMatrix> for SampsonError {
    const SQUARED: bool = false;

    fn error(&self, model: &FundamentalMatrix, p1: DVectorView<'_, f64>, p2: DVectorView<'_, f64>) -> f64 {
        let x1 = homogeneous(p1);
        let x2 = homogeneous(p2);
        let c = x2.dot(&(model.f * x1));

        let ft_x2 = model.f.transpose() * x2;
        let f_x1 = model.f * x1;
        let gradient_norm =
            (ft_x2.x * ft_x2.x + ft_x2.y * ft_x2.y + f_x1.x * f_x1.x + f_x1.y * f_x1.y).sqrt();

        if gradient_norm < 1e-10 {
            return f64::INFINITY;
        }
        c / gradient_norm
    }
}

impl EpipolarMetric for SampsonError {}
