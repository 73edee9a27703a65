//! A-contrario scoring of candidate models.
//!
//! A candidate is scored by the number of false alarms (NFA) of its best
//! consensus set: the expected number of models that would explain at least
//! `k` of the `N` correspondences as well as it does if the data were pure
//! noise. For sorted squared errors `e_1 ≤ … ≤ e_N` and a minimal sample of
//! size `m`,
//!
//! ```text
//! log10 NFA(k) = log10(M · (N − m))
//!              + (k − m) · (log10 α₀ + c · log10 e_k)
//!              + log10 C(N, k) + log10 C(k, m)
//! ```
//!
//! where `M` is the number of models a minimal sample can yield, `α₀` the
//! kernel's scale constant and `c` its error exponent. The threshold that
//! minimizes this quantity is the data-driven inlier/outlier boundary; a
//! model is meaningful when its minimum is below zero (NFA < 1).

/// Best split of a sorted residual vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NfaScore {
    /// Base-10 logarithm of the number of false alarms.
    pub log_nfa: f64,
    /// Number of leading residuals treated as inliers.
    pub inlier_count: usize,
}

impl NfaScore {
    /// `true` when the consensus is unlikely to have arisen by chance.
    pub fn is_meaningful(&self) -> bool {
        self.log_nfa < 0.0
    }
}

/// Precomputed tables for scoring residual vectors of a fixed length.
#[derive(Debug, Clone)]
pub struct NfaScorer {
    sample_size: usize,
    log_e0: f64,
    log_alpha0: f64,
    mult_error: f64,
    max_threshold: f64,
    /// `log10 C(N, k)` for `k` in `0..=N`.
    logc_n: Vec<f64>,
    /// `log10 C(k, m)` for `k` in `0..=N`.
    logc_k: Vec<f64>,
}

impl NfaScorer {
    /// Build the scorer for `num_data` correspondences.
    ///
    /// `max_threshold` caps the squared error a consensus set may reach; use
    /// `f64::INFINITY` for a fully automatic threshold.
    pub fn new(
        num_data: usize,
        sample_size: usize,
        max_models: usize,
        log_alpha0: f64,
        mult_error: f64,
        max_threshold: f64,
    ) -> Self {
        let log10_table: Vec<f64> = (0..=num_data).map(|k| (k as f64).log10()).collect();
        let logc_n = (0..=num_data)
            .map(|k| log_combi(k, num_data, &log10_table))
            .collect();
        let logc_k = (0..=num_data)
            .map(|n| log_combi(sample_size, n, &log10_table))
            .collect();

        Self {
            sample_size,
            log_e0: ((max_models.max(1) * num_data.saturating_sub(sample_size)) as f64).log10(),
            log_alpha0,
            mult_error,
            max_threshold,
            logc_n,
            logc_k,
        }
    }

    /// `log10 NFA` of the consensus made of the `k` smallest residuals, the
    /// largest of which is `squared_error`.
    pub fn log_nfa(&self, k: usize, squared_error: f64) -> f64 {
        let log_alpha =
            self.log_alpha0 + self.mult_error * (squared_error + f32::EPSILON as f64).log10();
        self.log_e0
            + log_alpha * k.saturating_sub(self.sample_size) as f64
            + self.logc_n[k]
            + self.logc_k[k]
    }

    /// Most meaningful split of ascending squared errors.
    ///
    /// Candidate sizes run from `m + 1` to `N` and stop at the first error
    /// above the threshold cap. Returns `None` when no size qualifies, which
    /// is always the case when `N ≤ m`.
    pub fn best(&self, sorted_errors: &[f64]) -> Option<NfaScore> {
        let n = sorted_errors.len().min(self.logc_n.len().saturating_sub(1));
        let mut best: Option<NfaScore> = None;
        for k in (self.sample_size + 1)..=n {
            let e = sorted_errors[k - 1];
            if e > self.max_threshold {
                break;
            }
            let log_nfa = self.log_nfa(k, e);
            if log_nfa.is_nan() {
                continue;
            }
            if best.map_or(true, |b| log_nfa < b.log_nfa) {
                best = Some(NfaScore {
                    log_nfa,
                    inlier_count: k,
                });
            }
        }
        best
    }
}

/// `log10` of the binomial coefficient `C(n, k)`; zero outside `0 < k < n`.
fn log_combi(k: usize, n: usize, log10_table: &[f64]) -> f64 {
    if k == 0 || k >= n {
        return 0.0;
    }
    let k = k.min(n - k);
    (1..=k).map(|i| log10_table[n - i + 1] - log10_table[i]).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn table(n: usize) -> Vec<f64> {
        (0..=n).map(|k| (k as f64).log10()).collect()
    }

    #[test]
    fn log_combi_matches_binomials() {
        let t = table(10);
        assert_abs_diff_eq!(log_combi(3, 10, &t), 120f64.log10(), epsilon = 1e-12);
        assert_abs_diff_eq!(log_combi(7, 10, &t), 120f64.log10(), epsilon = 1e-12);
        assert_abs_diff_eq!(log_combi(1, 10, &t), 1.0, epsilon = 1e-12);
        assert_eq!(log_combi(10, 10, &t), 0.0);
        assert_eq!(log_combi(0, 10, &t), 0.0);
    }

    #[test]
    fn log_nfa_combines_all_terms() {
        let scorer = NfaScorer::new(10, 3, 1, 0.5, 1.0, f64::INFINITY);
        let k = 6;
        let e = 0.01;
        let expected = 7f64.log10()
            + 3.0 * (0.5 + (e + f32::EPSILON as f64).log10())
            + 210f64.log10()
            + 20f64.log10();
        assert_abs_diff_eq!(scorer.log_nfa(k, e), expected, epsilon = 1e-9);
    }

    #[test]
    fn exact_inliers_are_split_from_outliers() {
        // 20 near-perfect residuals followed by 10 large ones.
        let mut errors = vec![1e-12; 20];
        errors.extend((0..10).map(|i| 50.0 + i as f64));

        let scorer = NfaScorer::new(errors.len(), 3, 1, std::f64::consts::PI.log10(), 1.0, f64::INFINITY);
        let best = scorer.best(&errors).unwrap();

        assert_eq!(best.inlier_count, 20);
        assert!(best.is_meaningful());
    }

    #[test]
    fn minimal_problem_size_has_no_score() {
        let scorer = NfaScorer::new(3, 3, 1, 0.0, 1.0, f64::INFINITY);
        assert!(scorer.best(&[0.0, 0.0, 0.0]).is_none());
    }

    #[test]
    fn threshold_cap_limits_consensus() {
        let errors = [1e-6, 1e-6, 1e-6, 1e-6, 1e-6, 2.0, 3.0, 4.0];
        let scorer = NfaScorer::new(errors.len(), 2, 1, 0.0, 1.0, 1.0);
        let best = scorer.best(&errors).unwrap();
        assert!(best.inlier_count <= 5);

        let capped = NfaScorer::new(errors.len(), 2, 1, 0.0, 1.0, 1e-9);
        assert!(capped.best(&errors).is_none());
    }

    #[test]
    fn uniform_noise_is_not_meaningful() {
        // Residuals spread evenly over a range comparable to the domain.
        let errors: Vec<f64> = (1..=40).map(|i| i as f64 * 10.0).collect();
        let scorer = NfaScorer::new(errors.len(), 3, 1, std::f64::consts::PI.log10(), 1.0, f64::INFINITY);
        let best = scorer.best(&errors).unwrap();
        assert!(!best.is_meaningful(), "log NFA {} for noise", best.log_nfa);
    }
}
