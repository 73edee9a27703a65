//! Uniform random sampling of distinct indices.
//!
//! Every routine here draws `count` distinct indices from a half-open range
//! with each `count`-subset equally likely. The draw is a partial
//! Fisher–Yates shuffle over a working pool: step `i` picks uniformly among
//! the `range - i` indices not yet taken and swaps it into position `i`, so
//! there is no rejection loop and no chance of a duplicate.
//!
//! Asking for more indices than the range holds is a caller bug and panics.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::Sampler;

/// Draw `count` distinct indices from `[lower, upper)`.
///
/// # Panics
/// If `lower > upper` or `count > upper - lower`.
pub fn uniform_sample_range<R: Rng + ?Sized>(
    rng: &mut R,
    lower: usize,
    upper: usize,
    count: usize,
) -> Vec<usize> {
    assert!(lower <= upper, "invalid range [{lower}, {upper})");
    let range = upper - lower;
    assert!(
        count <= range,
        "cannot draw {count} distinct indices from a range of {range}"
    );

    let mut pool: Vec<usize> = (lower..upper).collect();
    for i in 0..count {
        let j = rng.gen_range(i..range);
        pool.swap(i, j);
    }
    pool.truncate(count);
    pool
}

/// Draw `count` distinct indices from `[0, upper)`.
pub fn uniform_sample<R: Rng + ?Sized>(rng: &mut R, count: usize, upper: usize) -> Vec<usize> {
    uniform_sample_range(rng, 0, upper, count)
}

/// Same draw as [`uniform_sample_range`], returned as an ordered set.
pub fn uniform_sample_set_range<R: Rng + ?Sized>(
    rng: &mut R,
    lower: usize,
    upper: usize,
    count: usize,
) -> BTreeSet<usize> {
    uniform_sample_range(rng, lower, upper, count)
        .into_iter()
        .collect()
}

/// Same draw as [`uniform_sample`], returned as an ordered set.
pub fn uniform_sample_set<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    upper: usize,
) -> BTreeSet<usize> {
    uniform_sample_set_range(rng, 0, upper, count)
}

/// Uniform random sampler drawing samples without replacement.
pub struct UniformSampler {
    rng: StdRng,
}

impl Default for UniformSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl UniformSampler {
    /// Construct a new sampler with a random seed.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Construct a sampler from a fixed seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draw a sample as an ordered set from `[lower, upper)`.
    pub fn sample_set_range(&mut self, lower: usize, upper: usize, count: usize) -> BTreeSet<usize> {
        uniform_sample_set_range(&mut self.rng, lower, upper, count)
    }
}

impl Sampler for UniformSampler {
    fn sample_range(&mut self, lower: usize, upper: usize, count: usize) -> Vec<usize> {
        uniform_sample_range(&mut self.rng, lower, upper, count)
    }
}
