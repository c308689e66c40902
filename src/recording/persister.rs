// src/recording/persister.rs
//! Background drain of the capture queue into the sink
//!
//! One tokio task wakes every purge interval, drains the queue and writes
//! each record under its id. `flush` runs the same drain on demand; both
//! paths hold the drain lock, so the sink only ever sees one capture writer.

use super::capture_queue::CaptureQueue;
use crate::codec::SerdeRegistry;
use crate::observability::{CAPTURE_PERSISTED, CAPTURE_PERSIST_FAILURES};
use crate::sink::SinkPort;
use crate::utils::errors::Result;
use chrono::{DateTime, Utc};
use metrics::counter;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of one drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub written: usize,
    pub failed: usize,
}

/// Persister statistics
#[derive(Debug, Clone, Default)]
pub struct PersisterStats {
    pub drains: u64,
    pub records_written: u64,
    pub write_failures: u64,
    pub last_drain_at: Option<DateTime<Utc>>,
    pub total_drain_time_ms: u64,
}

impl PersisterStats {
    pub fn avg_drain_time_ms(&self) -> u64 {
        if self.drains == 0 {
            0
        } else {
            self.total_drain_time_ms / self.drains
        }
    }
}

struct Drainer {
    queue: Arc<CaptureQueue>,
    sink: Arc<dyn SinkPort>,
    serde: Arc<SerdeRegistry>,
    drain_lock: Mutex<()>,
    stats: parking_lot::Mutex<PersisterStats>,
}

impl Drainer {
    async fn drain(&self) -> DrainSummary {
        let _guard = self.drain_lock.lock().await;

        let records = self.queue.drain();
        if records.is_empty() {
            return DrainSummary::default();
        }

        debug!("Draining {} captured records", records.len());
        let start = Instant::now();
        let mut summary = DrainSummary::default();

        for record in records {
            let bytes = match self.serde.encode(&record) {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!("Failed to serialize record {}: {}", record.id(), e);
                    summary.failed += 1;
                    continue;
                }
            };

            match self.sink.write(record.id(), &bytes).await {
                Ok(()) => summary.written += 1,
                Err(e) => {
                    error!("Failed to persist record {}: {}", record.id(), e);
                    summary.failed += 1;
                }
            }
        }

        counter!(CAPTURE_PERSISTED).increment(summary.written as u64);
        counter!(CAPTURE_PERSIST_FAILURES).increment(summary.failed as u64);

        let elapsed = start.elapsed();
        let mut stats = self.stats.lock();
        stats.drains += 1;
        stats.records_written += summary.written as u64;
        stats.write_failures += summary.failed as u64;
        stats.last_drain_at = Some(Utc::now());
        stats.total_drain_time_ms += elapsed.as_millis() as u64;

        debug!(
            "Drain wrote {} records ({} failed) in {:?}",
            summary.written, summary.failed, elapsed
        );

        summary
    }
}

/// Owner of the periodic drain task
pub struct CapturePersister {
    drainer: Arc<Drainer>,
    purge_interval: Duration,
    cancel: CancellationToken,
    writer_handle: Option<JoinHandle<()>>,
}

impl CapturePersister {
    pub fn new(
        queue: Arc<CaptureQueue>,
        sink: Arc<dyn SinkPort>,
        serde: Arc<SerdeRegistry>,
        purge_interval: Duration,
    ) -> Self {
        Self {
            drainer: Arc::new(Drainer {
                queue,
                sink,
                serde,
                drain_lock: Mutex::new(()),
                stats: parking_lot::Mutex::new(PersisterStats::default()),
            }),
            purge_interval,
            cancel: CancellationToken::new(),
            writer_handle: None,
        }
    }

    /// Start the background drain task
    pub fn start(&mut self) -> Result<()> {
        if self.writer_handle.is_some() {
            warn!("Capture persister already running");
            return Ok(());
        }

        info!(
            "Starting capture persister (purge every {:?})",
            self.purge_interval
        );

        let drainer = Arc::clone(&self.drainer);
        let cancel = self.cancel.clone();
        let period = self.purge_interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        drainer.drain().await;
                    }

                    _ = cancel.cancelled() => {
                        drainer.drain().await;
                        break;
                    }
                }
            }

            debug!("Capture persister stopped");
        });

        self.writer_handle = Some(handle);
        Ok(())
    }

    /// Drain now, waiting for any in-flight background drain first
    pub async fn flush(&self) -> DrainSummary {
        self.drainer.drain().await
    }

    pub fn stats(&self) -> PersisterStats {
        self.drainer.stats.lock().clone()
    }

    pub fn purge_interval(&self) -> Duration {
        self.purge_interval
    }

    pub fn is_running(&self) -> bool {
        self.writer_handle.is_some()
    }

    /// Final drain, then stop the background task
    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down capture persister");

        self.cancel.cancel();

        match self.writer_handle.take() {
            Some(handle) => {
                if let Err(e) = handle.await {
                    error!("Capture persister task failed: {}", e);
                }
            }
            None => {
                self.drainer.drain().await;
            }
        }

        Ok(())
    }
}

impl Drop for CapturePersister {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
