//! Fundamental matrix solvers: the minimal 7-point and the linear 8-point
//! algorithms.
//!
//! Both encode the epipolar constraint `x2ᵗ F x1 = 0` of every
//! correspondence as one row of a homogeneous system `A f = 0`, with `f` the
//! row-major entries of `F`. Neither normalizes its input; condition the
//! points beforehand (see [`crate::kernel::fundamental_kernel`]).

use nalgebra::{DMatrix, DVector, Matrix3, SVD};

use crate::core::Solver;
use crate::error::EstimationError;
use crate::models::FundamentalMatrix;
use crate::types::DataMatrix;
use crate::utils::{nullspace, right_singular_basis, solve_cubic};

/// Relative size of the third-smallest singular value below which the
/// 7-point system is considered to have a null space of dimension > 2.
pub const DEGENERATE_NULLSPACE_TOLERANCE: f64 = 1e-10;

/// Build the `N x 9` epipolar system, each row optionally scaled by a weight.
pub fn encode_epipolar_equation(
    x1: &DataMatrix,
    x2: &DataMatrix,
    weights: Option<&[f64]>,
) -> DMatrix<f64> {
    let n = x1.ncols();
    let mut a = DMatrix::<f64>::zeros(n, 9);
    for i in 0..n {
        let (u1, v1) = (x1[(0, i)], x1[(1, i)]);
        let (u2, v2) = (x2[(0, i)], x2[(1, i)]);
        let w = weights.map_or(1.0, |w| w[i]);

        let row = [
            u2 * u1,
            u2 * v1,
            u2,
            v2 * u1,
            v2 * v1,
            v2,
            u1,
            v1,
            1.0,
        ];
        for (j, value) in row.iter().enumerate() {
            a[(i, j)] = w * value;
        }
    }
    a
}

fn to_matrix(f: &DVector<f64>) -> Matrix3<f64> {
    Matrix3::from_row_slice(f.as_slice())
}

/// Coefficients of `det(F1 + α F2)` in ascending powers of `α`.
///
/// The determinant is a cubic in `α` whose constant and leading terms are
/// `det F1` and `det F2`; the two middle terms follow from its values at
/// `α = ±1`.
pub fn determinant_polynomial(f1: &Matrix3<f64>, f2: &Matrix3<f64>) -> [f64; 4] {
    let p0 = f1.determinant();
    let p3 = f2.determinant();
    let plus = (f1 + f2).determinant();
    let minus = (f1 - f2).determinant();

    let p2 = 0.5 * (plus + minus) - p0;
    let p1 = 0.5 * (plus - minus) - p3;
    [p0, p1, p2, p3]
}

/// Zero the smallest singular value of `f`.
pub fn enforce_rank2(f: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    let svd = SVD::new(*f, true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut d = svd.singular_values;

    let mut smallest = 0;
    for i in 1..3 {
        if d[i] < d[smallest] {
            smallest = i;
        }
    }
    d[smallest] = 0.0;

    Some(u * Matrix3::from_diagonal(&d) * v_t)
}

fn check_input(
    x1: &DataMatrix,
    x2: &DataMatrix,
    required: usize,
) -> Result<(), EstimationError> {
    for x in [x1, x2] {
        if x.nrows() != 2 {
            return Err(EstimationError::DimensionMismatch {
                expected: 2,
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
    if x1.ncols() < required {
        return Err(EstimationError::InsufficientData {
            required,
            available: x1.ncols(),
        });
    }
    Ok(())
}

/// Minimal solver from seven correspondences, yielding up to three
/// candidates.
///
/// The two-dimensional null space `F1 + α F2` of the epipolar system is
/// restricted to its singular members by the cubic `det(F1 + α F2) = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SevenPointSolver {
    reject_degenerate: bool,
}

impl Default for SevenPointSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SevenPointSolver {
    /// Solver that discards samples whose null space has more than two
    /// dimensions (repeated points, pure rotation, planar scenes).
    pub fn new() -> Self {
        Self {
            reject_degenerate: true,
        }
    }

    /// Solver that always uses the two smallest singular directions, even
    /// when the null space is larger.
    pub fn permissive() -> Self {
        Self {
            reject_degenerate: false,
        }
    }

    pub fn rejects_degenerate(&self) -> bool {
        self.reject_degenerate
    }
}

impl Solver for SevenPointSolver {
    type Model = FundamentalMatrix;

    fn point_dimension(&self) -> usize {
        2
    }

    fn sample_size(&self) -> usize {
        7
    }

    fn max_models(&self) -> usize {
        3
    }

    fn solve(&self, x1: &DataMatrix, x2: &DataMatrix) -> Vec<FundamentalMatrix> {
        if check_input(x1, x2, 7).is_err() {
            return Vec::new();
        }

        let a = encode_epipolar_equation(x1, x2, None);
        let Some(basis) = right_singular_basis(&a) else {
            return Vec::new();
        };

        if self.reject_degenerate {
            let largest = basis.singular_values.last().copied().unwrap_or(0.0);
            if basis.singular_values[2] <= DEGENERATE_NULLSPACE_TOLERANCE * largest {
                return Vec::new();
            }
        }

        let f1 = to_matrix(&basis.vectors[0]);
        let f2 = to_matrix(&basis.vectors[1]);

        solve_cubic(&determinant_polynomial(&f1, &f2))
            .into_iter()
            .map(|alpha| FundamentalMatrix::new(f1 + f2 * alpha))
            .collect()
    }
}

/// Linear solver from eight or more correspondences.
///
/// With more than eight points the least-squares solution is projected onto
/// the rank-2 matrices.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EightPointSolver;

impl EightPointSolver {
    pub fn new() -> Self {
        Self
    }

    /// Solve with one non-negative weight per correspondence scaling its
    /// row of the epipolar system.
    pub fn solve_weighted(
        &self,
        x1: &DataMatrix,
        x2: &DataMatrix,
        weights: Option<&[f64]>,
    ) -> Result<Vec<FundamentalMatrix>, EstimationError> {
        check_input(x1, x2, 8)?;
        if let Some(w) = weights {
            if w.len() != x1.ncols() || w.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(EstimationError::InvalidWeights);
            }
        }

        let a = encode_epipolar_equation(x1, x2, weights);
        let Some(f) = nullspace(&a) else {
            return Ok(Vec::new());
        };

        let mut f = to_matrix(&f);
        if x1.ncols() > 8 {
            match enforce_rank2(&f) {
                Some(projected) => f = projected,
                None => return Ok(Vec::new()),
            }
        }
        Ok(vec![FundamentalMatrix::new(f)])
    }
}

impl Solver for EightPointSolver {
    type Model = FundamentalMatrix;

    fn point_dimension(&self) -> usize {
        2
    }

    fn sample_size(&self) -> usize {
        8
    }

    fn max_models(&self) -> usize {
        1
    }

    fn solve(&self, x1: &DataMatrix, x2: &DataMatrix) -> Vec<FundamentalMatrix> {
        self.solve_weighted(x1, x2, None).unwrap_or_default()
    }
}
