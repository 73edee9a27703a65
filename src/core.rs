//! Core traits and the a-contrario consensus engine.
//!
//! The engine is expressed over three seams:
//! - [`Solver`]: minimal solver turning a sample of correspondences into
//!   candidate models.
//! - [`ErrorMetric`]: per-correspondence residual of a model.
//! - [`Kernel`]: binds data, solver and metric together and carries the
//!   constants the NFA needs. [`crate::kernel::KernelAdaptor`] is the
//!   provided implementation.
//!
//! [`AcRansac`] draws minimal samples, fits candidates, and keeps the one
//! with the lowest number of false alarms (see [`crate::scoring`]). The
//! inlier threshold is an output of the search, not an input.

use std::ops::Range;
use std::time::Instant;

use log::{debug, warn};
use nalgebra::DVectorView;
use rand::Rng;
use rayon::prelude::*;

use crate::error::EstimationError;
use crate::samplers::UniformSampler;
use crate::scoring::NfaScorer;
use crate::settings::AcRansacSettings;
use crate::types::DataMatrix;

/// Minimal solver producing candidate models from a sample.
pub trait Solver {
    /// Model type produced by this solver.
    type Model: Clone;

    /// Number of rows of each point matrix (2 for image points, 3 for 3-D).
    fn point_dimension(&self) -> usize;

    /// Size of a minimal sample.
    fn sample_size(&self) -> usize;

    /// Upper bound on the number of candidates a minimal sample yields.
    fn max_models(&self) -> usize;

    /// Fit candidates to the columns of `x1` and `x2`. An empty vector means
    /// the sample was degenerate.
    fn solve(&self, x1: &DataMatrix, x2: &DataMatrix) -> Vec<Self::Model>;
}

/// Residual of a model for one correspondence.
pub trait ErrorMetric<M> {
    /// `true` when [`ErrorMetric::error`] already returns a squared quantity.
    const SQUARED: bool;

    fn error(&self, model: &M, p1: DVectorView<'_, f64>, p2: DVectorView<'_, f64>) -> f64;
}

/// Everything the consensus engine needs to know about a problem.
pub trait Kernel: Sync {
    type Model: Clone + Send;

    /// Size of a minimal sample.
    fn sample_size(&self) -> usize;

    /// Upper bound on the number of candidates per minimal sample.
    fn max_models(&self) -> usize;

    /// Number of correspondences.
    fn num_samples(&self) -> usize;

    /// Fit candidates to the correspondences at `sample`.
    fn fit(&self, sample: &[usize]) -> Vec<Self::Model>;

    /// Squared error of correspondence `index`.
    fn error(&self, index: usize, model: &Self::Model) -> f64;

    /// Squared errors of all correspondences, in index order.
    fn errors(&self, model: &Self::Model) -> Vec<f64> {
        (0..self.num_samples())
            .map(|i| self.error(i, model))
            .collect()
    }

    /// `log10` of the probability scale of a random residual.
    fn log_alpha0(&self) -> f64;

    /// Exponent applied to the squared error inside the NFA.
    fn mult_error(&self) -> f64;

    /// Scale mapping unnormalized distances into the kernel's working frame.
    fn normalizer_scale(&self) -> f64 {
        1.0
    }

    /// Map a model fitted on normalized data back to input coordinates.
    fn unnormalize(&self, _model: &mut Self::Model) {}

    /// Map a normalized squared error to an unnormalized distance.
    fn unnormalize_error(&self, squared_error: f64) -> f64 {
        squared_error.sqrt() / self.normalizer_scale()
    }
}

/// Sampler responsible for drawing minimal samples.
pub trait Sampler {
    /// Draw `count` distinct indices from `[lower, upper)`.
    fn sample_range(&mut self, lower: usize, upper: usize, count: usize) -> Vec<usize>;

    /// Draw `count` distinct indices from `[0, upper)`.
    fn sample(&mut self, count: usize, upper: usize) -> Vec<usize> {
        self.sample_range(0, upper, count)
    }

    /// Draw `count` distinct entries of `pool`.
    fn sample_from_pool(&mut self, pool: &[usize], count: usize) -> Vec<usize> {
        self.sample(count, pool.len())
            .into_iter()
            .map(|i| pool[i])
            .collect()
    }
}

/// Iteration bound from the standard RANSAC confidence formula
/// `N = log(1 - confidence) / log(1 - inlier_ratio^sample_size)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceTermination {
    /// Desired confidence in \[0, 1\].
    pub confidence: f64,
}

impl ConfidenceTermination {
    /// Number of iterations after which an all-inlier sample has been drawn
    /// with the configured confidence; `None` when no bound applies.
    pub fn required_iterations(&self, inlier_ratio: f64, sample_size: usize) -> Option<usize> {
        if !(0.0..1.0).contains(&self.confidence) || inlier_ratio <= 0.0 {
            return None;
        }
        if inlier_ratio >= 1.0 {
            return Some(1);
        }

        let p_good_sample = inlier_ratio.powi(sample_size as i32);
        if p_good_sample <= 0.0 || p_good_sample >= 1.0 {
            return None;
        }

        let log_one_minus_conf = (1.0 - self.confidence).ln();
        let log_one_minus_p = (1.0 - p_good_sample).ln();
        if !log_one_minus_conf.is_finite() || !log_one_minus_p.is_finite() {
            return None;
        }

        let required = (log_one_minus_conf / log_one_minus_p).ceil().max(1.0);
        if required >= usize::MAX as f64 {
            return None;
        }
        Some(required as usize)
    }
}

/// Best model found by the engine.
#[derive(Debug, Clone)]
pub struct ConsensusResult<M> {
    /// Model in input coordinates.
    pub model: M,
    /// Indices of the correspondences within the threshold, ascending.
    pub inliers: Vec<usize>,
    /// Selected inlier threshold as an unnormalized distance.
    pub threshold: f64,
    /// `log10` of the number of false alarms; negative when meaningful.
    pub nfa: f64,
    /// Number of iterations performed.
    pub iterations: usize,
}

/// Candidate kept while sampling, still in normalized coordinates.
#[derive(Debug, Clone)]
struct Candidate<M> {
    model: M,
    inliers: Vec<usize>,
    squared_threshold: f64,
    nfa: f64,
    iteration: usize,
}

impl<M> Candidate<M> {
    fn is_better_than(&self, other: &Self) -> bool {
        self.nfa < other.nfa || (self.nfa == other.nfa && self.iteration < other.iteration)
    }
}

fn pick_better<M>(a: Option<Candidate<M>>, b: Option<Candidate<M>>) -> Option<Candidate<M>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if b.is_better_than(&a) { b } else { a }),
        (a, None) => a,
        (None, b) => b,
    }
}

/// A-contrario RANSAC engine.
#[derive(Debug, Clone, Default)]
pub struct AcRansac {
    pub settings: AcRansacSettings,
}

impl AcRansac {
    pub fn new(settings: AcRansacSettings) -> Self {
        Self { settings }
    }

    /// Search for the most meaningful model of `kernel`.
    pub fn run<K: Kernel>(&self, kernel: &K) -> Result<ConsensusResult<K::Model>, EstimationError> {
        let n = kernel.num_samples();
        let m = kernel.sample_size();
        if n < m {
            return Err(EstimationError::InsufficientData {
                required: m,
                available: n,
            });
        }

        let settings = &self.settings;
        let max_threshold = settings
            .max_threshold
            .map_or(f64::INFINITY, |t| (t * kernel.normalizer_scale()).powi(2));
        let scorer = NfaScorer::new(
            n,
            m,
            kernel.max_models(),
            kernel.log_alpha0(),
            kernel.mult_error(),
            max_threshold,
        );
        let termination = ConfidenceTermination {
            confidence: settings.confidence,
        };
        let base_seed = settings.seed.unwrap_or_else(|| rand::thread_rng().gen());
        let batch_size = settings.batch_size.max(1);
        let started = Instant::now();

        let mut pool: Vec<usize> = (0..n).collect();
        let mut reserve = if settings.focused_sampling {
            settings.max_iterations / 10
        } else {
            0
        };
        let mut budget = settings.max_iterations - reserve;
        let mut iteration = 0;
        let mut best: Option<Candidate<K::Model>> = None;

        while iteration < budget {
            if let Some(limit) = settings.time_budget {
                if started.elapsed() >= limit {
                    debug!("time budget exhausted after {iteration} iterations");
                    break;
                }
            }

            let end = (iteration + batch_size).min(budget);
            let found = self.evaluate_batch(kernel, &scorer, &pool, base_seed, iteration..end);
            iteration = end;

            let improved = match found {
                Some(candidate) if best.as_ref().map_or(true, |b| candidate.is_better_than(b)) => {
                    debug!(
                        "iteration {}: log NFA {:.3}, {} inliers, squared threshold {:.3e}",
                        candidate.iteration,
                        candidate.nfa,
                        candidate.inliers.len(),
                        candidate.squared_threshold
                    );
                    best = Some(candidate);
                    true
                }
                _ => false,
            };

            let Some(current) = best.as_ref() else {
                // Nothing scored yet: keep sampling on credit from the reserve.
                if iteration == budget && reserve > 0 {
                    budget += 1;
                    reserve -= 1;
                }
                continue;
            };

            let meaningful_improvement = improved && current.nfa < 0.0;
            if meaningful_improvement || (iteration == budget && reserve > 0) {
                if settings.focused_sampling {
                    pool.clone_from(&current.inliers);
                }
                if reserve > 0 {
                    budget = iteration + reserve;
                    reserve = 0;
                }
            }

            if meaningful_improvement {
                let inlier_ratio = current.inliers.len() as f64 / n as f64;
                if let Some(required) = termination.required_iterations(inlier_ratio, m) {
                    if required < budget {
                        debug!(
                            "inlier ratio {inlier_ratio:.3} bounds the search to {} iterations",
                            required.max(iteration)
                        );
                        budget = required.max(iteration);
                    }
                }
            }
        }

        let Some(best) = best else {
            warn!("no candidate model after {iteration} iterations");
            return Err(EstimationError::NoConsensus {
                iterations: iteration,
            });
        };
        if best.nfa >= 0.0 {
            warn!(
                "best model is not meaningful (log NFA {:.3}) after {iteration} iterations",
                best.nfa
            );
            return Err(EstimationError::NoConsensus {
                iterations: iteration,
            });
        }

        let mut model = best.model;
        kernel.unnormalize(&mut model);
        let threshold = kernel.unnormalize_error(best.squared_threshold);
        debug!(
            "consensus: {} inliers, threshold {threshold:.4}, log NFA {:.3}, {iteration} iterations",
            best.inliers.len(),
            best.nfa
        );

        Ok(ConsensusResult {
            model,
            inliers: best.inliers,
            threshold,
            nfa: best.nfa,
            iterations: iteration,
        })
    }

    /// Evaluate the iterations in `range` and return their best candidate.
    fn evaluate_batch<K: Kernel>(
        &self,
        kernel: &K,
        scorer: &NfaScorer,
        pool: &[usize],
        base_seed: u64,
        range: Range<usize>,
    ) -> Option<Candidate<K::Model>> {
        let evaluate = |iteration: usize| -> Option<Candidate<K::Model>> {
            let mut sampler = UniformSampler::from_seed(base_seed.wrapping_add(iteration as u64));
            let sample = sampler.sample_from_pool(pool, kernel.sample_size());
            kernel
                .fit(&sample)
                .into_iter()
                .filter_map(|model| score_candidate(kernel, scorer, model, iteration))
                .fold(None, |acc, c| pick_better(acc, Some(c)))
        };

        if self.settings.parallel {
            range
                .into_par_iter()
                .map(evaluate)
                .reduce(|| None, pick_better)
        } else {
            range.map(evaluate).fold(None, pick_better)
        }
    }
}

/// Score one model: sort its residuals, find the most meaningful split and
/// collect the indices within the selected threshold.
fn score_candidate<K: Kernel>(
    kernel: &K,
    scorer: &NfaScorer,
    model: K::Model,
    iteration: usize,
) -> Option<Candidate<K::Model>> {
    let errors: Vec<f64> = kernel
        .errors(&model)
        .into_iter()
        .map(|e| if e.is_finite() { e } else { f64::INFINITY })
        .collect();

    let mut sorted = errors.clone();
    sorted.sort_by(f64::total_cmp);

    let score = scorer.best(&sorted)?;
    let squared_threshold = sorted[score.inlier_count - 1];
    let inliers = errors
        .iter()
        .enumerate()
        .filter(|(_, &e)| e <= squared_threshold)
        .map(|(i, _)| i)
        .collect();

    Some(Candidate {
        model,
        inliers,
        squared_threshold,
        nfa: score.log_nfa,
        iteration,
    })
}
