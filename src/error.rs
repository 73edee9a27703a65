//! Error type shared by the kernels, the consensus engine and the high-level
//! API.

use thiserror::Error;

/// Failures reported to callers of the estimation routines.
///
/// Per-sample numerical trouble (a degenerate minimal sample, a solver that
/// yields no model) is absorbed inside the consensus loop and never surfaces
/// here; only call-level failures do.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimationError {
    #[error("not enough correspondences: {required} required, {available} available")]
    InsufficientData { required: usize, available: usize },

    #[error("points must have {expected} rows, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("point sets differ in size: {left} vs {right}")]
    CountMismatch { left: usize, right: usize },

    #[error("weights must be finite and non-negative, one per correspondence")]
    InvalidWeights,

    #[error("no meaningful consensus found after {iterations} iterations")]
    NoConsensus { iterations: usize },

    #[error("degenerate configuration: {0}")]
    Degenerate(&'static str),

    #[error("refinement did not converge after {iterations} iterations")]
    RefinementFailed { iterations: usize },
}
