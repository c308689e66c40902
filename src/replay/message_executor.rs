// src/replay/message_executor.rs
//! Message-queue and event-stream replay
//!
//! The broker client lives outside the engine behind `MessagePublisher`. The
//! executor only resolves the target, tags the message and wraps the receipt.

use super::registry::ReplayExecutor;
use super::targets::TargetTable;
use super::{REPLAY_ID_HEADER, REPLAY_MODE_HEADER, REPLAY_MODE_TEST};
use crate::model::{
    DeliveryReceipt, MessageSend, ProtocolTag, RequestPayload, ResponsePayload, TestRecord,
};
use crate::utils::errors::{EngineError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Sends one message to a broker endpoint
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, endpoint: &str, message: &MessageSend) -> Result<DeliveryReceipt>;
}

/// Replays MESSAGE_QUEUE and EVENT_STREAM records through a publisher
pub struct MessageReplayExecutor {
    targets: Arc<TargetTable>,
    publisher: Arc<dyn MessagePublisher>,
}

impl MessageReplayExecutor {
    pub fn new(targets: Arc<TargetTable>, publisher: Arc<dyn MessagePublisher>) -> Self {
        Self { targets, publisher }
    }
}

#[async_trait]
impl ReplayExecutor for MessageReplayExecutor {
    async fn execute(&self, record: &TestRecord, client_id: &str) -> Result<ResponsePayload> {
        let (message, protocol) = match record.request() {
            RequestPayload::MessageQueue(m) => (m, ProtocolTag::MessageQueue),
            RequestPayload::EventStream(m) => (m, ProtocolTag::EventStream),
            RequestPayload::Http(_) => {
                return Err(EngineError::ProtocolMismatch {
                    record: ProtocolTag::Http,
                    payload: ProtocolTag::MessageQueue,
                })
            }
        };

        let target = self.targets.lookup(client_id)?;

        let mut message = message.clone();
        message.headers.retain(|name, _| {
            !name.eq_ignore_ascii_case(REPLAY_ID_HEADER)
                && !name.eq_ignore_ascii_case(REPLAY_MODE_HEADER)
        });
        message.headers.extend(target.headers.clone());
        message
            .headers
            .insert(REPLAY_ID_HEADER.to_string(), record.id().to_string());
        message
            .headers
            .insert(REPLAY_MODE_HEADER.to_string(), REPLAY_MODE_TEST.to_string());

        debug!(
            "Replaying {} to {} via {}",
            message.identity(),
            client_id,
            target.base_url
        );

        let receipt = tokio::time::timeout(
            target.timeout,
            self.publisher.publish(&target.base_url, &message),
        )
        .await
        .map_err(|_| {
            EngineError::ExecutionFailed(format!(
                "Publish of {} timed out after {:?}",
                record.id(),
                target.timeout
            ))
        })??;

        Ok(match protocol {
            ProtocolTag::EventStream => ResponsePayload::EventStream(receipt),
            _ => ResponsePayload::MessageQueue(receipt),
        })
    }
}
