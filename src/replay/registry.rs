// src/replay/registry.rs
//! Protocol-keyed replay executors

use crate::model::{ProtocolTag, ResponsePayload, TestRecord};
use crate::utils::errors::{EngineError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Re-issues a captured request against a replay target
///
/// Implementations attach the record id and the TEST marker to the outgoing
/// call. Request/response protocols return the live response; fire-and-forget
/// protocols return their delivery receipt.
#[async_trait]
pub trait ReplayExecutor: Send + Sync {
    async fn execute(&self, record: &TestRecord, client_id: &str) -> Result<ResponsePayload>;
}

/// Executors by protocol tag
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: DashMap<ProtocolTag, Arc<dyn ReplayExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor, replacing any previous one for the tag
    pub fn register(&self, protocol: ProtocolTag, executor: Arc<dyn ReplayExecutor>) {
        if self.executors.insert(protocol, executor).is_some() {
            warn!("Replaced replay executor for {}", protocol);
        } else {
            info!("Registered replay executor for {}", protocol);
        }
    }

    pub fn is_registered(&self, protocol: ProtocolTag) -> bool {
        self.executors.contains_key(&protocol)
    }

    pub fn protocols(&self) -> Vec<ProtocolTag> {
        let mut tags: Vec<_> = self.executors.iter().map(|e| *e.key()).collect();
        tags.sort();
        tags
    }

    /// Replay `record` against the target registered as `client_id`
    ///
    /// Fails with `Dispatch` before any call is made when no executor serves
    /// the record's protocol.
    pub async fn dispatch(&self, record: &TestRecord, client_id: &str) -> Result<ResponsePayload> {
        let protocol = record.protocol();
        let executor = self
            .executors
            .get(&protocol)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(EngineError::Dispatch(protocol))?;

        debug!("Dispatching {} replay of {} to {}", protocol, record.id(), client_id);

        let response = executor.execute(record, client_id).await?;
        if response.protocol() != protocol {
            return Err(EngineError::ProtocolMismatch {
                record: protocol,
                payload: response.protocol(),
            });
        }
        Ok(response)
    }
}
