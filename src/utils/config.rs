// src/utils/config.rs
//! Engine configuration
//!
//! Read once at startup from an optional `traffic-replay.{yaml,toml,json}`
//! file layered under `REPLAY__*` environment variables, then treated as
//! immutable.

use crate::codec::{Codec, CompressionLevel};
use crate::compare::DiffKind;
use crate::orchestrator::Mode;
use crate::utils::errors::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Marker Dropwizard-style services embed in their generic 500 bodies
pub const DEFAULT_GENERIC_ERROR_MARKER: &str =
    "There was an error processing your request. It has been logged (ID";

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Process-wide mode
    pub mode: Mode,
    pub sampling: SamplingSettings,
    pub compare: CompareSettings,
    pub queue: QueueSettings,
    pub codecs: CodecSettings,
    pub storage: StorageSettings,
    /// Replay targets by client id
    pub targets: Vec<TargetSettings>,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingSettings {
    /// Share of requests to capture, 0.00 to 100.00
    pub percentage: f64,

    /// Case-insensitive regexes over `"METHOD PATH"`
    pub whitelist: Vec<String>,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            percentage: 0.0,
            whitelist: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareSettings {
    /// Path globs per diff kind whose diffs are suppressed
    pub ignore: BTreeMap<DiffKind, Vec<String>>,

    /// Bodies both containing this marker compare equal
    pub generic_error_marker: Option<String>,

    /// Headers excluded from HTTP header diffs
    pub transport_headers: Vec<String>,
}

impl Default for CompareSettings {
    fn default() -> Self {
        Self {
            ignore: BTreeMap::new(),
            generic_error_marker: Some(DEFAULT_GENERIC_ERROR_MARKER.to_string()),
            transport_headers: vec!["content-encoding".to_string(), "content-length".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Hard bound on queued records, memory and disk combined
    pub capacity: usize,

    /// In-memory slots when an overflow file is configured
    pub memory_slots: Option<usize>,

    pub purge_interval_secs: u64,

    /// Spill file absorbing bursts beyond the in-memory slots
    pub overflow_path: Option<PathBuf>,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            capacity: 1000,
            memory_slots: None,
            purge_interval_secs: 30,
            overflow_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecSettings {
    pub default: Codec,

    /// Codec key to codec, e.g. `test_record: json_zstd`
    pub bindings: HashMap<String, Codec>,

    pub compression_level: CompressionLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub base_dir: PathBuf,
    pub db_name: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./replay-data"),
            db_name: "records.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSettings {
    pub client_id: String,

    /// Base URL or broker address of the candidate
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra headers attached to every replayed call
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl EngineConfig {
    /// Load from `traffic-replay.*` in the working directory plus environment
    pub fn load() -> Result<Self> {
        Self::build(config::File::with_name("traffic-replay").required(false))
    }

    /// Load from an explicit file plus environment
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::build(config::File::from(path.as_ref()).required(true))
    }

    fn build<S>(file: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("REPLAY")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("sampling.whitelist"),
            )
            .build()?;

        let config: EngineConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that can never work
    pub fn validate(&self) -> Result<()> {
        let pct = self.sampling.percentage;
        if !(0.0..=100.0).contains(&pct) || pct.is_nan() {
            return Err(EngineError::ConfigError(format!(
                "sampling.percentage must be within 0-100, got {}",
                pct
            )));
        }

        if self.queue.capacity == 0 {
            return Err(EngineError::ConfigError(
                "queue.capacity must be positive".to_string(),
            ));
        }

        if self.queue.purge_interval_secs == 0 {
            return Err(EngineError::ConfigError(
                "queue.purge_interval_secs must be at least 1".to_string(),
            ));
        }

        if let Some(slots) = self.queue.memory_slots {
            if slots == 0 || slots > self.queue.capacity {
                return Err(EngineError::ConfigError(format!(
                    "queue.memory_slots must be within 1-{}, got {}",
                    self.queue.capacity, slots
                )));
            }
        }

        let mut seen = HashSet::new();
        for target in &self.targets {
            if !seen.insert(target.client_id.as_str()) {
                return Err(EngineError::ConfigError(format!(
                    "Duplicate replay target: {}",
                    target.client_id
                )));
            }
        }

        Ok(())
    }
}
