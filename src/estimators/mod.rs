//! Minimal solvers for geometric models.
//!
//! - Fundamental matrix: 7-point and 8-point algorithms
//! - Similarity transform between 3-D point sets: Umeyama

pub mod fundamental;
pub mod similarity;

pub use fundamental::{EightPointSolver, SevenPointSolver};
pub use similarity::{UmeyamaSolver, find_rts, umeyama};
