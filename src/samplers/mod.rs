//! Sampling strategies for minimal sets.
//!
//! Only uniform sampling is provided; it backs the [`Sampler`](crate::core::Sampler)
//! trait used by the consensus engine.

pub mod uniform;

pub use uniform::{
    UniformSampler, uniform_sample, uniform_sample_range, uniform_sample_set,
    uniform_sample_set_range,
};
