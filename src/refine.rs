//! Levenberg–Marquardt refinement of a similarity on its inliers.
//!
//! The problem is parameterized around the initial rotation `R0` as
//! `[s, ω, t]`, with the rotation `exp([ω]×)·R0`, so the search starts at
//! `ω = 0` away from any singularity. Residuals, cost, gradient and Jacobian
//! are exposed through the argmin problem traits.

use argmin::core::{CostFunction, Error, Gradient, Jacobian, Operator};
use log::{debug, warn};
use nalgebra::{DMatrix, DVector, Matrix3, Rotation3, Vector3};

use crate::error::EstimationError;
use crate::models::Similarity;
use crate::types::DataMatrix;

const NUM_PARAMS: usize = 7;

/// Stopping rules of [`refine_similarity`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmSettings {
    pub max_iterations: usize,
    /// Stop when the largest gradient component falls below this.
    pub gradient_tolerance: f64,
    /// Stop when a step is this small relative to the parameters.
    pub step_tolerance: f64,
    /// Stop when an accepted step lowers the cost by less than this fraction.
    pub cost_tolerance: f64,
    /// Initial damping, relative to the diagonal of `JᵗJ`.
    pub initial_damping: f64,
}

impl Default for LmSettings {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            gradient_tolerance: 1e-12,
            step_tolerance: 1e-12,
            cost_tolerance: 1e-12,
            initial_damping: 1e-3,
        }
    }
}

/// Stacked residuals `s·R·x1 + t − x2` of a similarity over a point set.
pub struct SimilarityProblem<'a> {
    x1: &'a DataMatrix,
    x2: &'a DataMatrix,
    rotation0: Matrix3<f64>,
}

impl<'a> SimilarityProblem<'a> {
    pub fn new(x1: &'a DataMatrix, x2: &'a DataMatrix, rotation0: Matrix3<f64>) -> Self {
        Self { x1, x2, rotation0 }
    }

    /// `(scale, translation, rotation)` for a parameter vector.
    pub fn similarity(&self, p: &DVector<f64>) -> (f64, Vector3<f64>, Matrix3<f64>) {
        let omega = Vector3::new(p[1], p[2], p[3]);
        let rotation = Rotation3::new(omega).matrix() * self.rotation0;
        (p[0], Vector3::new(p[4], p[5], p[6]), rotation)
    }

    /// Parameters reproducing `(scale, translation)` with the initial
    /// rotation.
    pub fn initial_params(&self, scale: f64, translation: &Vector3<f64>) -> DVector<f64> {
        DVector::from_vec(vec![
            scale,
            0.0,
            0.0,
            0.0,
            translation.x,
            translation.y,
            translation.z,
        ])
    }

    fn residuals(&self, p: &DVector<f64>) -> DVector<f64> {
        let (scale, translation, rotation) = self.similarity(p);
        let sr = rotation * scale;
        let n = self.x1.ncols();
        let mut r = DVector::zeros(3 * n);
        for i in 0..n {
            let a = Vector3::new(self.x1[(0, i)], self.x1[(1, i)], self.x1[(2, i)]);
            let b = Vector3::new(self.x2[(0, i)], self.x2[(1, i)], self.x2[(2, i)]);
            let e = sr * a + translation - b;
            r.fixed_rows_mut::<3>(3 * i).copy_from(&e);
        }
        r
    }
}

impl Operator for SimilarityProblem<'_> {
    type Param = DVector<f64>;
    type Output = DVector<f64>;

    fn apply(&self, param: &Self::Param) -> Result<Self::Output, Error> {
        Ok(self.residuals(param))
    }
}

impl CostFunction for SimilarityProblem<'_> {
    type Param = DVector<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, Error> {
        Ok(self.residuals(param).norm_squared())
    }
}

impl Jacobian for SimilarityProblem<'_> {
    type Param = DVector<f64>;
    type Jacobian = DMatrix<f64>;

    fn jacobian(&self, param: &Self::Param) -> Result<Self::Jacobian, Error> {
        // Central differences.
        let mut jac = DMatrix::zeros(3 * self.x1.ncols(), param.len());
        for j in 0..param.len() {
            let h = 1e-7 * param[j].abs().max(1.0);
            let mut plus = param.clone();
            let mut minus = param.clone();
            plus[j] += h;
            minus[j] -= h;
            let column = (self.residuals(&plus) - self.residuals(&minus)) / (2.0 * h);
            jac.set_column(j, &column);
        }
        Ok(jac)
    }
}

impl Gradient for SimilarityProblem<'_> {
    type Param = DVector<f64>;
    type Gradient = DVector<f64>;

    fn gradient(&self, param: &Self::Param) -> Result<Self::Gradient, Error> {
        let jac = self.jacobian(param)?;
        Ok(jac.transpose() * self.residuals(param) * 2.0)
    }
}

fn numerical(_: Error) -> EstimationError {
    EstimationError::Degenerate("similarity refinement hit a numerical failure")
}

/// Refine `initial` to minimize `Σ ‖s·R·x1ᵢ + t − x2ᵢ‖²` over all columns.
///
/// Fails with [`EstimationError::RefinementFailed`] when the iteration limit
/// is reached before convergence and with [`EstimationError::Degenerate`]
/// when the result is not a valid similarity.
pub fn refine_similarity(
    x1: &DataMatrix,
    x2: &DataMatrix,
    initial: &Similarity,
    settings: &LmSettings,
) -> Result<Similarity, EstimationError> {
    for x in [x1, x2] {
        if x.nrows() != 3 {
            return Err(EstimationError::DimensionMismatch {
                expected: 3,
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
    if x1.ncols() < 3 {
        return Err(EstimationError::InsufficientData {
            required: 3,
            available: x1.ncols(),
        });
    }
    let (scale0, translation0, rotation0) = initial
        .parts()
        .ok_or(EstimationError::Degenerate("initial model is not a similarity"))?;

    let problem = SimilarityProblem::new(x1, x2, rotation0);
    let mut params = problem.initial_params(scale0, &translation0);
    let mut residuals = problem.apply(&params).map_err(numerical)?;
    let mut cost = residuals.norm_squared();
    let initial_cost = cost;
    let mut damping = settings.initial_damping;

    for iteration in 0..settings.max_iterations {
        let jac = problem.jacobian(&params).map_err(numerical)?;
        let jt = jac.transpose();
        let jtj = &jt * &jac;
        let g = &jt * &residuals;

        if g.amax() <= settings.gradient_tolerance {
            return finish(&problem, &params, iteration, initial_cost, cost);
        }

        let mut a = jtj.clone();
        for i in 0..NUM_PARAMS {
            a[(i, i)] += damping * jtj[(i, i)].max(1e-12);
        }
        let Some(step) = a.cholesky().map(|ch| ch.solve(&(-&g))) else {
            damping *= 10.0;
            continue;
        };

        if step.norm() <= settings.step_tolerance * (params.norm() + settings.step_tolerance) {
            return finish(&problem, &params, iteration, initial_cost, cost);
        }

        let candidate = &params + &step;
        let candidate_residuals = problem.apply(&candidate).map_err(numerical)?;
        let candidate_cost = candidate_residuals.norm_squared();

        if candidate_cost.is_finite() && candidate_cost < cost {
            let decrease = (cost - candidate_cost) / cost.max(f64::MIN_POSITIVE);
            params = candidate;
            residuals = candidate_residuals;
            cost = candidate_cost;
            damping = (damping / 10.0).max(1e-15);
            if decrease <= settings.cost_tolerance {
                return finish(&problem, &params, iteration + 1, initial_cost, cost);
            }
        } else {
            damping *= 10.0;
            if damping > 1e16 {
                // No descent direction left at this precision.
                return finish(&problem, &params, iteration + 1, initial_cost, cost);
            }
        }
    }

    warn!(
        "similarity refinement did not converge in {} iterations (cost {cost:.3e})",
        settings.max_iterations
    );
    Err(EstimationError::RefinementFailed {
        iterations: settings.max_iterations,
    })
}

fn finish(
    problem: &SimilarityProblem<'_>,
    params: &DVector<f64>,
    iterations: usize,
    initial_cost: f64,
    cost: f64,
) -> Result<Similarity, EstimationError> {
    let (scale, translation, rotation) = problem.similarity(params);
    if !scale.is_finite() || scale < f64::EPSILON {
        warn!("similarity refinement collapsed the scale to {scale}");
        return Err(EstimationError::Degenerate("refined scale is not positive"));
    }
    debug!("similarity refinement converged in {iterations} iterations, cost {initial_cost:.3e} -> {cost:.3e}");
    Ok(Similarity::from_parts(scale, &translation, &rotation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::similarity_scene;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn perturbed(sim: &Similarity) -> Similarity {
        let (s, t, r) = sim.parts().unwrap();
        let tweak = Rotation3::new(Vector3::new(0.02, -0.01, 0.03));
        Similarity::from_parts(s * 1.05, &(t + Vector3::new(0.1, -0.2, 0.05)), &(tweak.matrix() * r))
    }

    #[test]
    fn refinement_recovers_exact_similarity() {
        let (x1, x2, truth) = similarity_scene(20, 12);
        let refined = refine_similarity(&x1, &x2, &perturbed(&truth), &LmSettings::default()).unwrap();
        assert_relative_eq!(refined.matrix, truth.matrix, epsilon = 1e-6);
    }

    #[test]
    fn refinement_lowers_cost_on_noisy_data() {
        let (x1, mut x2, truth) = similarity_scene(40, 3);
        let mut rng = StdRng::seed_from_u64(99);
        for v in x2.iter_mut() {
            *v += rng.gen_range(-0.01..0.01);
        }

        let start = perturbed(&truth);
        let refined = refine_similarity(&x1, &x2, &start, &LmSettings::default()).unwrap();

        let (_, _, r0) = start.parts().unwrap();
        let problem = SimilarityProblem::new(&x1, &x2, r0);
        let cost_of = |sim: &Similarity| {
            let (s, t, r) = sim.parts().unwrap();
            let p = SimilarityProblem::new(&x1, &x2, r).initial_params(s, &t);
            SimilarityProblem::new(&x1, &x2, r).cost(&p).unwrap()
        };
        let (s0, t0, _) = start.parts().unwrap();
        let start_cost = problem.cost(&problem.initial_params(s0, &t0)).unwrap();

        assert!(cost_of(&refined) < start_cost);
        assert!(cost_of(&refined) <= cost_of(&truth) + 1e-9);
    }

    #[test]
    fn gradient_matches_jacobian() {
        let (x1, x2, truth) = similarity_scene(6, 5);
        let (s, t, r) = perturbed(&truth).parts().unwrap();
        let problem = SimilarityProblem::new(&x1, &x2, r);
        let p = problem.initial_params(s, &t);

        let g = problem.gradient(&p).unwrap();
        let h = 1e-6;
        for j in 0..NUM_PARAMS {
            let mut plus = p.clone();
            plus[j] += h;
            let mut minus = p.clone();
            minus[j] -= h;
            let numeric = (problem.cost(&plus).unwrap() - problem.cost(&minus).unwrap()) / (2.0 * h);
            assert_relative_eq!(g[j], numeric, epsilon = 1e-4, max_relative = 1e-4);
        }
    }

    #[test]
    fn zero_iterations_is_a_failure() {
        let (x1, x2, truth) = similarity_scene(10, 1);
        let settings = LmSettings {
            max_iterations: 0,
            ..LmSettings::default()
        };
        let err = refine_similarity(&x1, &x2, &perturbed(&truth), &settings).unwrap_err();
        assert_eq!(err, EstimationError::RefinementFailed { iterations: 0 });
    }

    #[test]
    fn too_few_points_are_rejected() {
        let (x1, x2, truth) = similarity_scene(2, 1);
        let err = refine_similarity(&x1, &x2, &truth, &LmSettings::default()).unwrap_err();
        assert_eq!(
            err,
            EstimationError::InsufficientData {
                required: 3,
                available: 2
            }
        );
    }
}
