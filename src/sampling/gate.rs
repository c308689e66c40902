// src/sampling/gate.rs
//! Per-request capture decision
//!
//! A request passes the gate when it matches the whitelist (if any) and a
//! clock-derived value in `[0, 10000)` falls below the configured share in
//! basis points. The basis-point bound is exclusive, so 0 rejects everything
//! and 10000 (100.00%) accepts everything.

use crate::utils::config::SamplingSettings;
use crate::utils::errors::{EngineError, Result};
use regex::{Regex, RegexBuilder};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, trace};

/// Upper bound (exclusive) of the sampling value
pub const SAMPLING_RANGE: u32 = 10_000;

/// Immutable sampling configuration
#[derive(Debug, Clone)]
pub struct SamplingConfig {
    /// Share of traffic in hundredths of a percent
    basis_points: u32,
    whitelist: Vec<Regex>,
}

impl SamplingConfig {
    /// Build from a percentage (two-decimal precision) and whitelist patterns
    pub fn new<S: AsRef<str>>(percentage: f64, whitelist: &[S]) -> Result<Self> {
        if percentage.is_nan() || !(0.0..=100.0).contains(&percentage) {
            return Err(EngineError::ConfigError(format!(
                "Sampling percentage must be within 0-100, got {}",
                percentage
            )));
        }

        let whitelist = whitelist
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern.as_ref())
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        EngineError::ConfigError(format!(
                            "Invalid whitelist pattern '{}': {}",
                            pattern.as_ref(),
                            e
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            basis_points: (percentage * 100.0).round() as u32,
            whitelist,
        })
    }

    pub fn from_settings(settings: &SamplingSettings) -> Result<Self> {
        Self::new(settings.percentage, &settings.whitelist)
    }

    /// Capture everything
    pub fn always() -> Self {
        Self {
            basis_points: SAMPLING_RANGE,
            whitelist: vec![],
        }
    }

    /// Capture nothing
    pub fn never() -> Self {
        Self {
            basis_points: 0,
            whitelist: vec![],
        }
    }

    pub fn percentage(&self) -> f64 {
        self.basis_points as f64 / 100.0
    }

    pub fn basis_points(&self) -> u32 {
        self.basis_points
    }

    pub fn whitelist(&self) -> &[Regex] {
        &self.whitelist
    }

    /// Whether the identity passes the whitelist; an empty whitelist admits all
    pub fn is_whitelisted(&self, identity: &str) -> bool {
        self.whitelist.is_empty() || self.whitelist.iter().any(|re| re.is_match(identity))
    }
}

/// Stateless sampling decision
#[derive(Debug, Clone, Copy, Default)]
pub struct SamplingGate;

impl SamplingGate {
    pub fn new() -> Self {
        Self
    }

    /// Decide whether to capture the request identified by `"METHOD PATH"`
    pub fn should_capture(&self, identity: &str, config: &SamplingConfig) -> bool {
        if let Err(e) = Self::check_identity(identity) {
            debug!("Rejecting sample: {}", e);
            return false;
        }
        Self::decide(identity, config, clock_value())
    }

    /// Clock-free decision for a given sampling value in `[0, 10000)`
    pub fn decide(identity: &str, config: &SamplingConfig, value: u32) -> bool {
        if !config.is_whitelisted(identity) {
            trace!("{} not whitelisted", identity);
            return false;
        }
        value % SAMPLING_RANGE < config.basis_points
    }

    fn check_identity(identity: &str) -> Result<()> {
        if identity.trim().is_empty() {
            return Err(EngineError::SamplingInput("empty request identity".to_string()));
        }
        Ok(())
    }
}

/// Sampling value from the nanosecond wall clock
///
/// Coarse clocks leave the trailing decimal digits at zero, so the reading
/// goes through a 64-bit finalizer before taking it modulo the range.
fn clock_value() -> u32 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();

    let mut x = nanos;
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
    x ^= x >> 33;
    x = x.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    x ^= x >> 33;

    (x % SAMPLING_RANGE as u64) as u32
}
