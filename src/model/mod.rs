// src/model/mod.rs
//! Captured interaction data model
//!
//! - **TestRecord**: one captured request/response pair, keyed by an opaque id
//! - **Payloads**: protocol-specific request and response snapshots
//! - **ProtocolTag**: discriminator selecting the replay executor

pub mod payload;
pub mod record;

pub use payload::{
    find_header, DeliveryReceipt, HeaderMap, HttpRequest, HttpResponse, MessageSend,
    RequestPayload, ResponsePayload,
};
pub use record::TestRecord;

use crate::utils::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wire protocol a captured interaction belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtocolTag {
    Http,
    MessageQueue,
    EventStream,
}

impl ProtocolTag {
    pub const ALL: [ProtocolTag; 3] = [
        ProtocolTag::Http,
        ProtocolTag::MessageQueue,
        ProtocolTag::EventStream,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolTag::Http => "HTTP",
            ProtocolTag::MessageQueue => "MESSAGE_QUEUE",
            ProtocolTag::EventStream => "EVENT_STREAM",
        }
    }

    /// Protocols whose replay only yields delivery metadata
    pub fn is_fire_and_forget(&self) -> bool {
        !matches!(self, ProtocolTag::Http)
    }
}

impl fmt::Display for ProtocolTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolTag {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProtocolTag::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| EngineError::ConfigError(format!("Unknown protocol tag: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_tag_parse() {
        assert_eq!("http".parse::<ProtocolTag>().unwrap(), ProtocolTag::Http);
        assert_eq!(
            "MESSAGE_QUEUE".parse::<ProtocolTag>().unwrap(),
            ProtocolTag::MessageQueue
        );
        assert!("smtp".parse::<ProtocolTag>().is_err());
    }

    #[test]
    fn test_protocol_tag_serde_matches_display() {
        for tag in ProtocolTag::ALL {
            let json = serde_json::to_string(&tag).unwrap();
            assert_eq!(json, format!("\"{}\"", tag));
        }
    }
}
