//! Configuration of the a-contrario consensus engine.

use std::time::Duration;

/// Settings for [`AcRansac`](crate::core::AcRansac).
#[derive(Debug, Clone, PartialEq)]
pub struct AcRansacSettings {
    /// Total iteration budget, including the focused-sampling reserve.
    pub max_iterations: usize,
    /// Largest inlier distance the threshold selection may reach, in input
    /// units. `None` leaves the threshold fully automatic.
    pub max_threshold: Option<f64>,
    /// Confidence in \[0, 1) used to stop early once an all-inlier sample
    /// has almost certainly been drawn.
    pub confidence: f64,
    /// Base seed for the per-iteration generators; `None` draws one from
    /// entropy.
    pub seed: Option<u64>,
    /// Evaluate each batch of iterations on the rayon thread pool.
    pub parallel: bool,
    /// Number of iterations evaluated between budget checks.
    pub batch_size: usize,
    /// Wall-clock limit for the sampling loop.
    pub time_budget: Option<Duration>,
    /// Hold back a tenth of the budget and, once a meaningful model is
    /// found, draw further samples from its inliers only.
    pub focused_sampling: bool,
}

impl Default for AcRansacSettings {
    fn default() -> Self {
        Self {
            max_iterations: 1024,
            max_threshold: None,
            confidence: 0.99,
            seed: None,
            parallel: true,
            batch_size: 64,
            time_budget: None,
            focused_sampling: true,
        }
    }
}

impl AcRansacSettings {
    /// Defaults with a fixed seed, for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }
}
