//! # acransac - A-Contrario RANSAC for Geometric Estimation
//!
//! `acransac` estimates geometric models from correspondences contaminated
//! by outliers without asking for an inlier threshold. Every candidate model
//! is scored by its number of false alarms (NFA), and the threshold that
//! makes the model most meaningful is selected automatically.
//!
//! ## Quick Start
//!
//! ```rust
//! use acransac::{estimate_similarity, AcRansacSettings};
//! use nalgebra::DMatrix;
//!
//! // Six 3-D points (one per column) and their image under x ↦ 2x + (1, 0, 0).
//! let x1 = DMatrix::from_row_slice(3, 6, &[
//!     0.0, 1.0, 0.0, 0.0, 1.0, 2.0,
//!     0.0, 0.0, 1.0, 0.0, 1.0, 1.0,
//!     0.0, 0.0, 0.0, 1.0, 1.0, 3.0,
//! ]);
//! let x2 = x1.map(|v| 2.0 * v) + DMatrix::from_fn(3, 6, |r, _| if r == 0 { 1.0 } else { 0.0 });
//!
//! let result = estimate_similarity(&x1, &x2, false, Some(AcRansacSettings::seeded(1))).unwrap();
//! let (scale, _, _) = result.model.parts().unwrap();
//! assert!((scale - 2.0).abs() < 1e-9);
//! ```
//!
//! ## Extending the Library
//!
//! The engine is generic over three traits:
//!
//! - **[`Solver`](core::Solver)**: minimal solver producing candidate models
//! - **[`ErrorMetric<M>`](core::ErrorMetric)**: per-correspondence residual
//! - **[`Kernel`](core::Kernel)**: data, solver, metric and NFA constants bound
//!   together; [`KernelAdaptor`](kernel::KernelAdaptor) implements it for any
//!   solver/metric pair
//!
//! ## Modules
//!
//! - **[`api`]**: High-level estimation functions
//! - **[`core`]**: Traits and the consensus engine
//! - **[`scoring`]**: NFA computation and threshold selection
//! - **[`kernel`]**: Kernel adaptor, normalization and constructors
//! - **[`estimators`]**: 7-point, 8-point and Umeyama solvers
//! - **[`metrics`]**: Residual functions
//! - **[`samplers`]**: Uniform sampling without replacement
//! - **[`models`]**: Fundamental matrix and similarity types
//! - **[`refine`]**: Levenberg–Marquardt similarity refinement
//! - **[`settings`]**: Engine configuration

pub mod api;
pub mod core;
pub mod error;
pub mod estimators;
pub mod kernel;
pub mod metrics;
pub mod models;
pub mod refine;
pub mod samplers;
pub mod scoring;
pub mod settings;
pub mod types;
pub mod utils;

#[cfg(test)]
mod test_utils;

pub use api::{
    EstimationResult, FundamentalMethod, RefinementStatus, estimate_fundamental_matrix,
    estimate_similarity,
};
pub use core::{AcRansac, ConsensusResult, ErrorMetric, Kernel, Sampler, Solver};
pub use error::EstimationError;
pub use kernel::{ImageSize, KernelAdaptor, fundamental_kernel, similarity_kernel};
pub use models::{FundamentalMatrix, Similarity};
pub use settings::AcRansacSettings;
