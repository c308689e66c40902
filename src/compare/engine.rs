// src/compare/engine.rs
//! Comparison entry point
//!
//! Every diff, whatever the layer that produced it, passes through the ignore
//! rules before it is returned.

use super::diff::diff_values;
use super::http::{diff_responses, HttpCompareOptions};
use super::{DiffDetail, IgnoreRuleSet};
use crate::codec::SerdeRegistry;
use crate::model::ResponsePayload;
use crate::utils::config::{CompareSettings, DEFAULT_GENERIC_ERROR_MARKER};
use crate::utils::errors::{EngineError, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace};

/// Compares baseline and candidate responses
#[derive(Debug, Clone)]
pub struct CompareEngine {
    ignore: IgnoreRuleSet,
    http: HttpCompareOptions,
    registry: Arc<SerdeRegistry>,
}

impl CompareEngine {
    pub fn new(ignore: IgnoreRuleSet) -> Self {
        Self {
            ignore,
            http: HttpCompareOptions {
                generic_error_marker: Some(DEFAULT_GENERIC_ERROR_MARKER.to_string()),
                transport_headers: ["content-encoding", "content-length"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
            },
            registry: Arc::new(SerdeRegistry::default()),
        }
    }

    pub fn from_settings(settings: &CompareSettings) -> Result<Self> {
        let ignore = IgnoreRuleSet::from_settings(&settings.ignore)?;
        Ok(Self::new(ignore)
            .with_marker(settings.generic_error_marker.clone())
            .with_transport_headers(&settings.transport_headers))
    }

    /// Replace the generic error marker; `None` disables marker equivalence
    pub fn with_marker(mut self, marker: Option<String>) -> Self {
        self.http.generic_error_marker = marker.filter(|m| !m.is_empty());
        self
    }

    pub fn with_transport_headers<S: AsRef<str>>(mut self, headers: &[S]) -> Self {
        self.http.transport_headers = headers
            .iter()
            .map(|h| h.as_ref().to_ascii_lowercase())
            .collect();
        self
    }

    /// Registry used to decode documents in `compare_bytes`
    pub fn with_registry(mut self, registry: Arc<SerdeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn ignore_rules(&self) -> &IgnoreRuleSet {
        &self.ignore
    }

    /// Differences between two responses, after suppression
    pub fn compare(
        &self,
        baseline: &ResponsePayload,
        candidate: &ResponsePayload,
    ) -> Result<Vec<DiffDetail>> {
        let diffs = match (baseline, candidate) {
            (ResponsePayload::Http(a), ResponsePayload::Http(b)) => {
                diff_responses(a, b, &self.http)
            }
            _ => {
                let a = to_document(baseline)?;
                let b = to_document(candidate)?;
                diff_values(&a, &b)
            }
        };

        Ok(self.suppress(diffs))
    }

    /// Differences between two document trees, after suppression
    pub fn compare_values(&self, baseline: &Value, candidate: &Value) -> Vec<DiffDetail> {
        self.suppress(diff_values(baseline, candidate))
    }

    /// Compare two serialized documents
    ///
    /// When only one side decodes, the sides are compared as raw bytes. When
    /// neither does, the raw comparison comes back inside `CompareFailed`.
    pub fn compare_bytes(&self, baseline: &[u8], candidate: &[u8]) -> Result<Vec<DiffDetail>> {
        let codec = self.registry.default_codec();
        let decoded = (
            self.registry.decode_value(codec, baseline),
            self.registry.decode_value(codec, candidate),
        );

        match decoded {
            (Ok(a), Ok(b)) => Ok(self.compare_values(&a, &b)),
            (Err(e), Err(_)) => Err(EngineError::CompareFailed {
                reason: format!("neither side decodes as {}: {}", codec, e),
                partial: self.suppress(raw_diff(baseline, candidate)),
            }),
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => {
                debug!("One side failed to decode ({}), using raw equality", e);
                Ok(self.suppress(raw_diff(baseline, candidate)))
            }
        }
    }

    fn suppress(&self, diffs: Vec<DiffDetail>) -> Vec<DiffDetail> {
        let total = diffs.len();
        let kept = self.ignore.apply(diffs);
        if kept.len() < total {
            trace!("Ignore rules suppressed {} diffs", total - kept.len());
        }
        kept
    }
}

impl Default for CompareEngine {
    fn default() -> Self {
        Self::new(IgnoreRuleSet::default())
    }
}

fn to_document(response: &ResponsePayload) -> Result<Value> {
    serde_json::to_value(response).map_err(|e| EngineError::CompareFailed {
        reason: format!("response is not representable as a document: {}", e),
        partial: Vec::new(),
    })
}

fn raw_diff(baseline: &[u8], candidate: &[u8]) -> Vec<DiffDetail> {
    if baseline == candidate {
        Vec::new()
    } else {
        vec![DiffDetail::modify_rendered(
            "",
            String::from_utf8_lossy(baseline),
            String::from_utf8_lossy(candidate),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::DiffKind;
    use crate::model::{DeliveryReceipt, HttpResponse};
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_compare_values_single_modify() {
        let engine = CompareEngine::default();
        let diffs = engine.compare_values(&json!({"a": 1, "b": 2}), &json!({"a": 1, "b": 3}));

        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].kind, DiffKind::Modify);
        assert_eq!(diffs[0].path, "/b");
    }

    #[test]
    fn test_ignored_date_header() {
        let mut ignore = BTreeMap::new();
        ignore.insert(DiffKind::Modify, vec!["/headers/Date".to_string()]);
        let settings = CompareSettings {
            ignore,
            ..Default::default()
        };
        let engine = CompareEngine::from_settings(&settings).unwrap();

        let baseline = ResponsePayload::Http(
            HttpResponse::new(200)
                .with_header("Date", "Mon, 01 Jan 2024 00:00:00 GMT")
                .with_body("{}"),
        );
        let candidate = ResponsePayload::Http(
            HttpResponse::new(200)
                .with_header("Date", "Tue, 02 Jan 2024 00:00:00 GMT")
                .with_body("{}"),
        );

        assert!(engine.compare(&baseline, &candidate).unwrap().is_empty());
        assert_eq!(
            CompareEngine::default()
                .compare(&baseline, &candidate)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_marker_disabled() {
        let engine = CompareEngine::default().with_marker(None);
        let baseline = ResponsePayload::Http(
            HttpResponse::new(500).with_body(format!("{} 1)", DEFAULT_GENERIC_ERROR_MARKER)),
        );
        let candidate = ResponsePayload::Http(
            HttpResponse::new(500).with_body(format!("{} 2)", DEFAULT_GENERIC_ERROR_MARKER)),
        );

        assert_eq!(engine.compare(&baseline, &candidate).unwrap().len(), 1);
    }

    #[test]
    fn test_receipts_compared_structurally() {
        let engine = CompareEngine::default();
        let a = ResponsePayload::MessageQueue(DeliveryReceipt {
            destination: "orders".to_string(),
            offset: Some(1),
            ..Default::default()
        });
        let b = ResponsePayload::MessageQueue(DeliveryReceipt {
            destination: "orders".to_string(),
            offset: Some(7),
            ..Default::default()
        });

        let diffs = engine.compare(&a, &b).unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].path, "/offset");
    }

    #[test]
    fn test_compare_bytes() {
        let engine = CompareEngine::default();

        let diffs = engine
            .compare_bytes(br#"{"a":1,"b":2}"#, br#"{"b":3,"a":1}"#)
            .unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].path, "/b");

        assert!(engine.compare_bytes(b"not json", br#"{"a":1}"#).unwrap().len() == 1);
    }

    #[test]
    fn test_compare_bytes_both_undecodable() {
        let engine = CompareEngine::default();

        match engine.compare_bytes(b"<a>", b"<b>") {
            Err(EngineError::CompareFailed { partial, .. }) => {
                assert_eq!(partial.len(), 1);
                assert_eq!(partial[0].before.as_deref(), Some("<a>"));
            }
            other => panic!("expected CompareFailed, got {:?}", other),
        }
    }
}
