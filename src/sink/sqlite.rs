// src/sink/sqlite.rs
//! Record storage using SQLite
//!
//! Serialized records and replay results live in two tables keyed by record
//! id. Rewriting an id replaces the previous row.

use super::SinkPort;
use crate::utils::config::StorageSettings;
use crate::utils::errors::{EngineError, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Base directory for storage
    pub base_dir: PathBuf,

    /// SQLite database file name
    pub db_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageSettings::default().into()
    }
}

impl From<StorageSettings> for StorageConfig {
    fn from(settings: StorageSettings) -> Self {
        Self {
            base_dir: settings.base_dir,
            db_name: settings.db_name,
        }
    }
}

/// SQLite-backed sink
pub struct SqliteSink {
    config: StorageConfig,
    db: Arc<Mutex<Connection>>,
}

impl SqliteSink {
    /// Open (or create) the database under the configured directory
    pub async fn new(config: StorageConfig) -> Result<Self> {
        fs::create_dir_all(&config.base_dir).await.map_err(|e| {
            EngineError::StorageFailed(format!("Failed to create directory: {}", e))
        })?;

        let db_path = config.base_dir.join(&config.db_name);
        let conn = Connection::open(&db_path).map_err(|e| {
            EngineError::StorageFailed(format!("Failed to open database: {}", e))
        })?;

        let sink = Self {
            config,
            db: Arc::new(Mutex::new(conn)),
        };

        sink.init_schema().await?;

        info!("Record storage initialized at {:?}", db_path);

        Ok(sink)
    }

    async fn init_schema(&self) -> Result<()> {
        let db = self.db.lock().await;

        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                payload BLOB NOT NULL,
                size INTEGER NOT NULL,
                written_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS results (
                id TEXT PRIMARY KEY,
                report TEXT NOT NULL,
                written_at INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| EngineError::StorageFailed(format!("Schema creation failed: {}", e)))?;

        Ok(())
    }

    /// Ids of every stored record, oldest write first
    pub async fn list_ids(&self) -> Result<Vec<String>> {
        let db = self.db.lock().await;

        let mut stmt = db.prepare("SELECT id FROM records ORDER BY written_at, id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(ids)
    }

    /// Stored replay result for a record, if any
    pub async fn read_result(&self, id: &str) -> Result<Option<String>> {
        let db = self.db.lock().await;

        let report = db
            .query_row(
                "SELECT report FROM results WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(report)
    }

    pub async fn stats(&self) -> Result<StorageStats> {
        let db = self.db.lock().await;

        let (total_records, total_size): (i64, i64) = db.query_row(
            "SELECT COUNT(*), COALESCE(SUM(size), 0) FROM records",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let total_results: i64 =
            db.query_row("SELECT COUNT(*) FROM results", [], |row| row.get(0))?;

        Ok(StorageStats {
            total_records: total_records as u64,
            total_size_bytes: total_size as u64,
            total_results: total_results as u64,
        })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }
}

#[async_trait]
impl SinkPort for SqliteSink {
    async fn write(&self, id: &str, bytes: &[u8]) -> Result<()> {
        let db = self.db.lock().await;

        db.execute(
            r#"
            INSERT INTO records (id, payload, size, written_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                payload = excluded.payload,
                size = excluded.size,
                written_at = excluded.written_at
            "#,
            params![id, bytes, bytes.len() as i64, chrono::Utc::now().timestamp_millis()],
        )
        .map_err(|e| EngineError::StorageFailed(format!("Failed to write record {}: {}", id, e)))?;

        debug!("Wrote record {} ({} bytes)", id, bytes.len());

        Ok(())
    }

    async fn read(&self, id: &str) -> Result<Vec<u8>> {
        let db = self.db.lock().await;

        db.query_row(
            "SELECT payload FROM records WHERE id = ?",
            params![id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| EngineError::StorageFailed(format!("Failed to read record {}: {}", id, e)))?
        .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    async fn write_result(&self, id: &str, text: &str) -> Result<()> {
        let db = self.db.lock().await;

        db.execute(
            r#"
            INSERT INTO results (id, report, written_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                report = excluded.report,
                written_at = excluded.written_at
            "#,
            params![id, text, chrono::Utc::now().timestamp_millis()],
        )
        .map_err(|e| EngineError::StorageFailed(format!("Failed to write result {}: {}", id, e)))?;

        Ok(())
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    pub total_records: u64,
    pub total_size_bytes: u64,
    pub total_results: u64,
}
