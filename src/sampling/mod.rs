// src/sampling/mod.rs
//! Capture sampling
//!
//! Decides, per inbound request, whether it is captured. Decisions share no
//! mutable state and are safe to run from any number of tasks.

pub mod gate;

pub use gate::{SamplingConfig, SamplingGate, SAMPLING_RANGE};
