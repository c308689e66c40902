// src/observability/mod.rs
//! Logging and metrics setup
//!
//! - **Tracing**: `tracing-subscriber` fmt layer, plain or JSON, filtered by
//!   `RUST_LOG` or the configured level
//! - **Metrics**: Prometheus exporter behind the `metrics` facade
//!
//! Counters emitted by the engine:
//!
//! | name | meaning |
//! |------|---------|
//! | `capture_enqueued_total` | records accepted by the capture queue |
//! | `capture_dropped_total` | records dropped at capacity or on build failure |
//! | `capture_persisted_total` | records written to the sink |
//! | `capture_persist_failures_total` | records the sink rejected |
//! | `replay_total{outcome}` | replays by `pass`, `fail`, `skipped` or `error` |

use crate::utils::config::LoggingSettings;
use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

pub const CAPTURE_ENQUEUED: &str = "capture_enqueued_total";
pub const CAPTURE_DROPPED: &str = "capture_dropped_total";
pub const CAPTURE_PERSISTED: &str = "capture_persisted_total";
pub const CAPTURE_PERSIST_FAILURES: &str = "capture_persist_failures_total";
pub const REPLAY_TOTAL: &str = "replay_total";

/// Install the global tracing subscriber
pub fn init_tracing(settings: &LoggingSettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .context("invalid log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = if settings.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))
}

/// Install the Prometheus recorder and its scrape endpoint
///
/// Must run inside a tokio runtime.
pub fn init_metrics() -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .install()
        .context("failed to install Prometheus recorder")
}
