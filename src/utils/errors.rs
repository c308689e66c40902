// src/utils/errors.rs
//! Error taxonomy for the capture/replay engine
//!
//! Capture-path failures are logged and dropped by their callers. Replay-path
//! failures are always handed back to whoever asked for the replay.

use crate::codec::Codec;
use crate::compare::DiffDetail;
use crate::model::ProtocolTag;
use thiserror::Error;

/// Result type used throughout the engine
pub type Result<T> = std::result::Result<T, EngineError>;

/// Boxed codec failure cause
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid configuration detected at startup
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Malformed input to a sampling decision
    #[error("Sampling input error: {0}")]
    SamplingInput(String),

    /// Durable storage failed
    #[error("Storage failed: {0}")]
    StorageFailed(String),

    /// No record is persisted under the given id
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Codec failure, carrying the original cause
    #[error("Serde error ({codec}): {source}")]
    Serde {
        codec: Codec,
        #[source]
        source: BoxedCause,
    },

    /// No executor registered for the protocol
    #[error("No replay executor registered for protocol {0}")]
    Dispatch(ProtocolTag),

    /// Replay executor could not complete the call
    #[error("Replay execution failed: {0}")]
    ExecutionFailed(String),

    /// Neither side of a comparison could be interpreted
    #[error("Comparison failed: {reason} ({} partial diffs)", partial.len())]
    CompareFailed {
        reason: String,
        partial: Vec<DiffDetail>,
    },

    /// Payload protocol does not match the record's protocol
    #[error("Protocol mismatch: record is {record}, payload is {payload}")]
    ProtocolMismatch {
        record: ProtocolTag,
        payload: ProtocolTag,
    },

    /// Request resolved to TEST without a replay id marker
    #[error("Request resolved to TEST mode without a replay id")]
    MissingReplayId,

    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    #[error("Export failed: {0}")]
    ExportFailed(String),
}

impl EngineError {
    /// Wrap a codec failure
    pub fn serde(codec: Codec, source: impl Into<BoxedCause>) -> Self {
        EngineError::Serde {
            codec,
            source: source.into(),
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        EngineError::StorageFailed(e.to_string())
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(e: config::ConfigError) -> Self {
        EngineError::ConfigError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_error_keeps_cause() {
        let cause = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = EngineError::serde(Codec::Json, cause);

        assert!(err.to_string().starts_with("Serde error (json)"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_compare_error_reports_partial_count() {
        let err = EngineError::CompareFailed {
            reason: "both sides undecodable".to_string(),
            partial: vec![],
        };
        assert!(err.to_string().contains("0 partial diffs"));
    }
}
