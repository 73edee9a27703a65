//! High-level entry points.
//!
//! Each function builds the matching kernel, runs [`AcRansac`] and packages
//! the outcome in an [`EstimationResult`]. Point sets are column-major
//! (`dim x N`), see [`crate::types`].

use log::{debug, warn};

use crate::core::{AcRansac, ConsensusResult};
use crate::error::EstimationError;
use crate::estimators::{EightPointSolver, SevenPointSolver};
use crate::kernel::{ImageSize, fundamental_kernel, similarity_kernel};
use crate::metrics::{EpipolarDistanceError, RtsSquaredResidualError};
use crate::models::{FundamentalMatrix, Similarity};
use crate::refine::{LmSettings, refine_similarity};
use crate::settings::AcRansacSettings;
use crate::types::{DataMatrix, extract_columns};

/// Outcome of the optional refinement stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefinementStatus {
    NotRequested,
    Converged,
    /// Refinement failed; the unrefined model was kept.
    Failed,
}

/// Result of a robust estimation.
#[derive(Debug, Clone)]
pub struct EstimationResult<M> {
    /// The estimated model.
    pub model: M,
    /// Indices of inlier correspondences, ascending.
    pub inliers: Vec<usize>,
    /// Automatically selected inlier threshold, in input units.
    pub threshold: f64,
    /// `log10` of the number of false alarms of the model.
    pub nfa: f64,
    /// Number of iterations performed.
    pub iterations: usize,
    pub refinement: RefinementStatus,
}

impl<M> From<ConsensusResult<M>> for EstimationResult<M> {
    fn from(consensus: ConsensusResult<M>) -> Self {
        Self {
            model: consensus.model,
            inliers: consensus.inliers,
            threshold: consensus.threshold,
            nfa: consensus.nfa,
            iterations: consensus.iterations,
            refinement: RefinementStatus::NotRequested,
        }
    }
}

/// Minimal solver used by [`estimate_fundamental_matrix`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FundamentalMethod {
    /// Up to three candidates per 7-correspondence sample.
    #[default]
    SevenPoint,
    /// One candidate per 8-correspondence sample.
    EightPoint,
}

/// Estimate the similarity `x2 ≈ s·R·x1 + t` between two 3-D point sets.
///
/// # Arguments
/// * `points1` - First set of 3D points (3xN matrix)
/// * `points2` - Second set of 3D points (3xN matrix)
/// * `refine` - Polish the model on its inliers with Levenberg–Marquardt
/// * `settings_opt` - Optional engine settings (uses defaults if None)
///
/// A failed refinement is not an error: the unrefined model is returned
/// with [`RefinementStatus::Failed`].
pub fn estimate_similarity(
    points1: &DataMatrix,
    points2: &DataMatrix,
    refine: bool,
    settings_opt: Option<AcRansacSettings>,
) -> Result<EstimationResult<Similarity>, EstimationError> {
    let kernel = similarity_kernel(RtsSquaredResidualError, points1, points2)?;
    let engine = AcRansac::new(settings_opt.unwrap_or_default());
    let mut result = EstimationResult::from(engine.run(&kernel)?);

    if refine {
        let x1 = extract_columns(points1, &result.inliers);
        let x2 = extract_columns(points2, &result.inliers);
        match refine_similarity(&x1, &x2, &result.model, &LmSettings::default()) {
            Ok(model) => {
                debug!("refined similarity on {} inliers", result.inliers.len());
                result.model = model;
                result.refinement = RefinementStatus::Converged;
            }
            Err(err) => {
                warn!("keeping unrefined similarity: {err}");
                result.refinement = RefinementStatus::Failed;
            }
        }
    }

    Ok(result)
}

/// Estimate the fundamental matrix `F` with `x2ᵗ F x1 = 0` from pixel
/// correspondences.
///
/// # Arguments
/// * `points1` - Points in the first image (2xN matrix)
/// * `size1` - Size of the first image
/// * `points2` - Points in the second image (2xN matrix)
/// * `size2` - Size of the second image
/// * `method` - Minimal solver
/// * `settings_opt` - Optional engine settings (uses defaults if None)
///
/// The reported threshold is a distance to the epipolar line, in pixels of
/// the second image.
pub fn estimate_fundamental_matrix(
    points1: &DataMatrix,
    size1: ImageSize,
    points2: &DataMatrix,
    size2: ImageSize,
    method: FundamentalMethod,
    settings_opt: Option<AcRansacSettings>,
) -> Result<EstimationResult<FundamentalMatrix>, EstimationError> {
    let engine = AcRansac::new(settings_opt.unwrap_or_default());
    let consensus = match method {
        FundamentalMethod::SevenPoint => engine.run(&fundamental_kernel(
            SevenPointSolver::new(),
            EpipolarDistanceError,
            points1,
            size1,
            points2,
            size2,
        )?)?,
        FundamentalMethod::EightPoint => engine.run(&fundamental_kernel(
            EightPointSolver::new(),
            EpipolarDistanceError,
            points1,
            size1,
            points2,
            size2,
        )?)?,
    };
    Ok(consensus.into())
}
