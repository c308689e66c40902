// src/model/payload.rs
//! Protocol-specific request and response snapshots

use super::ProtocolTag;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Header map keyed by the header name as observed on the wire
pub type HeaderMap = BTreeMap<String, String>;

/// Case-insensitive header lookup
pub fn find_header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Captured HTTP request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: String,

    /// Path component of the request URI
    pub path: String,

    /// Raw query string, without the leading `?`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    #[serde(default)]
    pub headers: HeaderMap,

    #[serde(default, with = "base64_bytes")]
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Canonical `"METHOD PATH"` identity used for sampling
    pub fn identity(&self) -> String {
        format!("{} {}", self.method.to_ascii_uppercase(), self.path)
    }

    /// Path plus query string
    pub fn path_and_query(&self) -> String {
        match self.query.as_deref() {
            Some(q) if !q.is_empty() => format!("{}?{}", self.path, q),
            _ => self.path.clone(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Captured HTTP response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,

    #[serde(default)]
    pub headers: HeaderMap,

    #[serde(default, with = "base64_bytes")]
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// A message published to a queue or stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSend {
    /// Topic, queue or exchange name
    pub destination: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default, with = "base64_bytes")]
    pub value: Vec<u8>,

    #[serde(default)]
    pub headers: HeaderMap,
}

impl MessageSend {
    pub fn new(destination: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            destination: destination.into(),
            key: None,
            value: value.into(),
            headers: HeaderMap::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn identity(&self) -> String {
        format!("PUBLISH {}", self.destination)
    }
}

/// Delivery metadata returned by a fire-and-forget send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeliveryReceipt {
    pub destination: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// Request snapshot, tagged by protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestPayload {
    Http(HttpRequest),
    MessageQueue(MessageSend),
    EventStream(MessageSend),
}

impl RequestPayload {
    pub fn protocol(&self) -> ProtocolTag {
        match self {
            RequestPayload::Http(_) => ProtocolTag::Http,
            RequestPayload::MessageQueue(_) => ProtocolTag::MessageQueue,
            RequestPayload::EventStream(_) => ProtocolTag::EventStream,
        }
    }

    /// Canonical identity of the request
    pub fn identity(&self) -> String {
        match self {
            RequestPayload::Http(req) => req.identity(),
            RequestPayload::MessageQueue(msg) | RequestPayload::EventStream(msg) => msg.identity(),
        }
    }

    /// Headers carried by the request, whatever the protocol
    pub fn headers(&self) -> &HeaderMap {
        match self {
            RequestPayload::Http(req) => &req.headers,
            RequestPayload::MessageQueue(msg) | RequestPayload::EventStream(msg) => &msg.headers,
        }
    }
}

/// Response snapshot, tagged by protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponsePayload {
    Http(HttpResponse),
    MessageQueue(DeliveryReceipt),
    EventStream(DeliveryReceipt),
}

impl ResponsePayload {
    pub fn protocol(&self) -> ProtocolTag {
        match self {
            ResponsePayload::Http(_) => ProtocolTag::Http,
            ResponsePayload::MessageQueue(_) => ProtocolTag::MessageQueue,
            ResponsePayload::EventStream(_) => ProtocolTag::EventStream,
        }
    }

    /// Delivery receipts carry no response content worth diffing
    pub fn is_delivery_only(&self) -> bool {
        matches!(
            self,
            ResponsePayload::MessageQueue(_) | ResponsePayload::EventStream(_)
        )
    }
}

/// Byte buffers as base64 strings, so self-describing codecs stay readable
pub(crate) mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
