// src/model/record.rs
//! The unit of capture and replay

use super::payload::{RequestPayload, ResponsePayload};
use super::ProtocolTag;
use crate::codec::CodecKey;
use crate::utils::errors::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// A captured interaction: one request and, once observed, its response
///
/// The protocol of both payloads always matches `protocol`. Records are
/// moved into the capture queue by value, so nothing can alter them once
/// they are queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRecord {
    id: String,
    protocol: ProtocolTag,
    request_identity: String,
    request: RequestPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    response: Option<ResponsePayload>,
    captured_at: DateTime<Utc>,
}

impl TestRecord {
    /// Start a new capture with a freshly generated id
    pub fn capture(request: RequestPayload) -> Self {
        Self::with_id(Ulid::new().to_string(), request)
    }

    /// Start a capture under a caller-supplied id
    pub fn with_id(id: impl Into<String>, request: RequestPayload) -> Self {
        Self {
            id: id.into(),
            protocol: request.protocol(),
            request_identity: request.identity(),
            request,
            response: None,
            captured_at: Utc::now(),
        }
    }

    /// Override the identity derived from the request
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.request_identity = identity.into();
        self
    }

    /// Append the observed response
    pub fn with_response(mut self, response: ResponsePayload) -> Result<Self> {
        self.attach_response(response)?;
        Ok(self)
    }

    pub fn attach_response(&mut self, response: ResponsePayload) -> Result<()> {
        if response.protocol() != self.protocol {
            return Err(EngineError::ProtocolMismatch {
                record: self.protocol,
                payload: response.protocol(),
            });
        }
        self.response = Some(response);
        Ok(())
    }

    /// Check the protocol invariant, e.g. after loading from storage
    pub fn validate(&self) -> Result<()> {
        let request_protocol = self.request.protocol();
        if request_protocol != self.protocol {
            return Err(EngineError::ProtocolMismatch {
                record: self.protocol,
                payload: request_protocol,
            });
        }
        if let Some(response) = &self.response {
            if response.protocol() != self.protocol {
                return Err(EngineError::ProtocolMismatch {
                    record: self.protocol,
                    payload: response.protocol(),
                });
            }
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn protocol(&self) -> ProtocolTag {
        self.protocol
    }

    pub fn request_identity(&self) -> &str {
        &self.request_identity
    }

    pub fn request(&self) -> &RequestPayload {
        &self.request
    }

    pub fn response(&self) -> Option<&ResponsePayload> {
        self.response.as_ref()
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

impl CodecKey for TestRecord {
    const CODEC_KEY: &'static str = "test_record";
}
