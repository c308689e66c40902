// src/sink/mod.rs
//! Durable storage of captured interactions
//!
//! - **SinkPort**: the storage seam every backend implements
//! - **InMemorySink**: concurrent map, for tests and embedding hosts
//! - **SqliteSink**: SQLite-backed records and replay results

pub mod memory;
pub mod sqlite;

pub use memory::InMemorySink;
pub use sqlite::{SqliteSink, StorageConfig, StorageStats};

use crate::utils::errors::Result;
use async_trait::async_trait;

/// Storage for serialized records and replay results
///
/// A `write` followed by a `read` of the same id from the same caller must
/// observe the write. No ordering is promised across different ids. A read
/// of an id that was never written fails with `EngineError::NotFound`.
#[async_trait]
pub trait SinkPort: Send + Sync {
    async fn write(&self, id: &str, bytes: &[u8]) -> Result<()>;

    async fn read(&self, id: &str) -> Result<Vec<u8>>;

    /// Persist a human-readable replay result for a record
    async fn write_result(&self, id: &str, text: &str) -> Result<()>;
}
