//! Kernel adaptor binding a correspondence set to a solver and a metric.
//!
//! The adaptor owns (or borrows) the working copy of both point sets, the
//! normalizing transforms applied to them and the constants used by the
//! a-contrario score. Two constructors cover the supported problems:
//! [`similarity_kernel`] for 3-D registration on raw coordinates and
//! [`fundamental_kernel`] for two-view geometry on image-size preconditioned
//! pixels.

use std::borrow::Cow;
use std::f64::consts::PI;

use nalgebra::Matrix3;

use crate::core::{ErrorMetric, Kernel, Solver};
use crate::error::EstimationError;
use crate::estimators::UmeyamaSolver;
use crate::metrics::EpipolarMetric;
use crate::models::{FundamentalMatrix, Similarity};
use crate::types::{DataMatrix, extract_columns};

/// Models that can be mapped back from normalized coordinates.
pub trait Unnormalize {
    /// `n1` and `n2` are the transforms that were applied to the first and
    /// second point set.
    fn unnormalize(&mut self, n1: &Matrix3<f64>, n2: &Matrix3<f64>);
}

impl Unnormalize for FundamentalMatrix {
    fn unnormalize(&mut self, n1: &Matrix3<f64>, n2: &Matrix3<f64>) {
        self.f = n2.transpose() * self.f * n1;
    }
}

impl Unnormalize for Similarity {
    // Registration runs on raw coordinates.
    fn unnormalize(&mut self, _n1: &Matrix3<f64>, _n2: &Matrix3<f64>) {}
}

/// Width and height of an image in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSize {
    pub width: f64,
    pub height: f64,
}

impl ImageSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn diagonal(&self) -> f64 {
        self.width.hypot(self.height)
    }

    fn validate(&self) -> Result<(), EstimationError> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if valid(self.width) && valid(self.height) {
            Ok(())
        } else {
            Err(EstimationError::Degenerate("image size must be positive and finite"))
        }
    }

    /// Transform centering the image on the origin and scaling it to unit
    /// area: `x ↦ (x − w/2) / √(w·h)`.
    pub fn preconditioner(&self) -> Matrix3<f64> {
        let d = 1.0 / self.area().sqrt();
        Matrix3::new(
            d,
            0.0,
            -0.5 * self.width * d,
            0.0,
            d,
            -0.5 * self.height * d,
            0.0,
            0.0,
            1.0,
        )
    }
}

/// Apply a 2-D projective transform to every column of a `2 x N` matrix.
pub fn apply_transform(t: &Matrix3<f64>, points: &DataMatrix) -> DataMatrix {
    let mut out = DataMatrix::zeros(2, points.ncols());
    for i in 0..points.ncols() {
        let p = t * nalgebra::Vector3::new(points[(0, i)], points[(1, i)], 1.0);
        out[(0, i)] = p.x / p.z;
        out[(1, i)] = p.y / p.z;
    }
    out
}

/// `log10 α₀` for point-to-line distances measured in an image of `size`,
/// normalized by `scale`: a random point falls within distance `r` of a line
/// with probability at most `2·r·diagonal / area`.
pub fn image_log_alpha0(size: &ImageSize, scale: f64) -> f64 {
    (2.0 * size.diagonal() / size.area() / scale).log10()
}

/// Generic [`Kernel`] over a [`Solver`] and an [`ErrorMetric`].
#[derive(Debug, Clone)]
pub struct KernelAdaptor<'a, S, E> {
    solver: S,
    metric: E,
    x1: Cow<'a, DataMatrix>,
    x2: Cow<'a, DataMatrix>,
    n1: Matrix3<f64>,
    n2: Matrix3<f64>,
    log_alpha0: f64,
    mult_error: f64,
}

impl<'a, S: Solver, E: ErrorMetric<S::Model>> KernelAdaptor<'a, S, E> {
    /// Adaptor over raw coordinates with identity normalization,
    /// `log α₀ = 0` and unit error exponent.
    pub fn new(
        solver: S,
        metric: E,
        x1: &'a DataMatrix,
        x2: &'a DataMatrix,
    ) -> Result<Self, EstimationError> {
        check_shapes(solver.point_dimension(), x1, x2)?;
        Ok(Self {
            solver,
            metric,
            x1: Cow::Borrowed(x1),
            x2: Cow::Borrowed(x2),
            n1: Matrix3::identity(),
            n2: Matrix3::identity(),
            log_alpha0: 0.0,
            mult_error: 1.0,
        })
    }

    pub fn with_log_alpha0(mut self, log_alpha0: f64) -> Self {
        self.log_alpha0 = log_alpha0;
        self
    }

    pub fn with_mult_error(mut self, mult_error: f64) -> Self {
        self.mult_error = mult_error;
        self
    }

    /// Replace the working data by `n1·x1` and `n2·x2`.
    pub fn with_normalization(mut self, n1: Matrix3<f64>, n2: Matrix3<f64>) -> Self {
        self.x1 = Cow::Owned(apply_transform(&n1, &self.x1));
        self.x2 = Cow::Owned(apply_transform(&n2, &self.x2));
        self.n1 = n1;
        self.n2 = n2;
        self
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Working copy of the first point set.
    pub fn points1(&self) -> &DataMatrix {
        &self.x1
    }

    /// Working copy of the second point set.
    pub fn points2(&self) -> &DataMatrix {
        &self.x2
    }

    pub fn normalizer1(&self) -> &Matrix3<f64> {
        &self.n1
    }

    pub fn normalizer2(&self) -> &Matrix3<f64> {
        &self.n2
    }
}

fn check_shapes(dim: usize, x1: &DataMatrix, x2: &DataMatrix) -> Result<(), EstimationError> {
    for x in [x1, x2] {
        if x.nrows() != dim {
            return Err(EstimationError::DimensionMismatch {
                expected: dim,
                found: x.nrows(),
            });
        }
    }
    if x1.ncols() != x2.ncols() {
        return Err(EstimationError::CountMismatch {
            left: x1.ncols(),
            right: x2.ncols(),
        });
    }
    Ok(())
}

impl<S, E> Kernel for KernelAdaptor<'_, S, E>
where
    S: Solver + Sync,
    S::Model: Unnormalize + Send,
    E: ErrorMetric<S::Model> + Sync,
{
    type Model = S::Model;

    fn sample_size(&self) -> usize {
        self.solver.sample_size()
    }

    fn max_models(&self) -> usize {
        self.solver.max_models()
    }

    fn num_samples(&self) -> usize {
        self.x1.ncols()
    }

    fn fit(&self, sample: &[usize]) -> Vec<S::Model> {
        let x1 = extract_columns(&self.x1, sample);
        let x2 = extract_columns(&self.x2, sample);
        let mut models = self.solver.solve(&x1, &x2);
        models.truncate(self.solver.max_models());
        models
    }

    fn error(&self, index: usize, model: &S::Model) -> f64 {
        let e = self
            .metric
            .error(model, self.x1.column(index), self.x2.column(index));
        if E::SQUARED { e } else { e * e }
    }

    fn log_alpha0(&self) -> f64 {
        self.log_alpha0
    }

    fn mult_error(&self) -> f64 {
        self.mult_error
    }

    fn normalizer_scale(&self) -> f64 {
        self.n2[(0, 0)]
    }

    fn unnormalize(&self, model: &mut S::Model) {
        model.unnormalize(&self.n1, &self.n2);
    }
}

/// Kernel for 3-D similarity registration on raw coordinates.
pub fn similarity_kernel<'a, E>(
    metric: E,
    x1: &'a DataMatrix,
    x2: &'a DataMatrix,
) -> Result<KernelAdaptor<'a, UmeyamaSolver, E>, EstimationError>
where
    E: ErrorMetric<Similarity>,
{
    Ok(KernelAdaptor::new(UmeyamaSolver, metric, x1, x2)?
        .with_log_alpha0(PI.log10())
        .with_mult_error(1.0))
}

/// Kernel for fundamental matrix estimation between two images.
///
/// Points are preconditioned with [`ImageSize::preconditioner`]; the model
/// is mapped back to pixels on output and the threshold reported in pixels.
pub fn fundamental_kernel<'a, S, E>(
    solver: S,
    metric: E,
    x1: &'a DataMatrix,
    size1: ImageSize,
    x2: &'a DataMatrix,
    size2: ImageSize,
) -> Result<KernelAdaptor<'a, S, E>, EstimationError>
where
    S: Solver<Model = FundamentalMatrix>,
    E: EpipolarMetric,
{
    size1.validate()?;
    size2.validate()?;

    let n1 = size1.preconditioner();
    let n2 = size2.preconditioner();
    let log_alpha0 = image_log_alpha0(&size2, n2[(0, 0)]);

    Ok(KernelAdaptor::new(solver, metric, x1, x2)?
        .with_normalization(n1, n2)
        .with_log_alpha0(log_alpha0)
        .with_mult_error(0.5))
}
