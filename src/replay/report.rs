// src/replay/report.rs
//! Result of one replay

use crate::compare::DiffDetail;
use crate::model::ProtocolTag;
use crate::utils::errors::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Verdict of replaying a single record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub record_id: String,
    pub protocol: ProtocolTag,

    /// False when there was nothing to compare
    pub compared: bool,

    pub passed: bool,
    pub diffs: Vec<DiffDetail>,
    pub replayed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl ReplayReport {
    /// Report for a comparison that ran; passes iff no diffs survived
    pub fn compared(
        record_id: impl Into<String>,
        protocol: ProtocolTag,
        diffs: Vec<DiffDetail>,
        elapsed: Duration,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            protocol,
            compared: true,
            passed: diffs.is_empty(),
            diffs,
            replayed_at: Utc::now(),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// Report for a replay with no baseline or candidate response to compare
    pub fn not_compared(record_id: impl Into<String>, protocol: ProtocolTag, elapsed: Duration) -> Self {
        Self {
            record_id: record_id.into(),
            protocol,
            compared: false,
            passed: true,
            diffs: Vec::new(),
            replayed_at: Utc::now(),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// Metric label for this report
    pub fn outcome(&self) -> &'static str {
        match (self.compared, self.passed) {
            (false, _) => "skipped",
            (true, true) => "pass",
            (true, false) => "fail",
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| EngineError::ExportFailed(format!("Report serialization error: {}", e)))
    }
}
