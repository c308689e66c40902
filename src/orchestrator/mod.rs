// src/orchestrator/mod.rs
//! Per-request mode resolution
//!
//! The orchestrator sits where the host intercepts inbound calls. It decides
//! whether a call passes through, is captured for later replay, or is being
//! replayed and must be checked against its baseline.

pub mod mode;
#[allow(clippy::module_inception)]
pub mod orchestrator;

pub use mode::{EffectiveMode, Mode};
pub use orchestrator::{
    Intercepted, InterceptedCall, ModeOrchestrator, Observed, OrchestratorParts,
};
