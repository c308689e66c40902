// src/sink/memory.rs
//! In-memory sink

use super::SinkPort;
use crate::utils::errors::{EngineError, Result};
use async_trait::async_trait;
use dashmap::DashMap;

/// Sink keeping records and results in concurrent maps
#[derive(Debug, Default)]
pub struct InMemorySink {
    records: DashMap<String, Vec<u8>>,
    results: DashMap<String, String>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.records.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Last result written for a record
    pub fn result(&self, id: &str) -> Option<String> {
        self.results.get(id).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl SinkPort for InMemorySink {
    async fn write(&self, id: &str, bytes: &[u8]) -> Result<()> {
        self.records.insert(id.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn read(&self, id: &str) -> Result<Vec<u8>> {
        self.records
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    async fn write_result(&self, id: &str, text: &str) -> Result<()> {
        self.results.insert(id.to_string(), text.to_string());
        Ok(())
    }
}
