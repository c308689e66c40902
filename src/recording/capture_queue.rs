// src/recording/capture_queue.rs
//! Bounded capture queue
//!
//! Records land in a lock-free `ArrayQueue`. When a spill file is
//! configured, records that do not fit in memory are appended to it instead.
//! A single reservation counter enforces `capacity` across both tiers, so
//! `enqueue` never blocks and never grows past the bound.

use super::overflow::{OverflowBuffer, DEFAULT_SPILL_BYTES};
use crate::codec::Codec;
use crate::model::TestRecord;
use crate::observability::{CAPTURE_DROPPED, CAPTURE_ENQUEUED};
use crate::utils::config::QueueSettings;
use crate::utils::errors::{EngineError, Result};
use crossbeam::queue::ArrayQueue;
use metrics::counter;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{error, info, warn};

/// Queue sizing
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Hard bound on queued records
    pub capacity: usize,

    /// In-memory slots; defaults to `capacity`, or a quarter of it with a spill file
    pub memory_slots: Option<usize>,

    pub overflow_path: Option<PathBuf>,
}

impl QueueConfig {
    pub fn memory_only(capacity: usize) -> Self {
        Self {
            capacity,
            memory_slots: None,
            overflow_path: None,
        }
    }

    fn resolved_memory_slots(&self) -> usize {
        match (self.memory_slots, &self.overflow_path) {
            (Some(slots), _) => slots.min(self.capacity),
            (None, Some(_)) => (self.capacity / 4).max(1),
            (None, None) => self.capacity,
        }
    }
}

impl From<&QueueSettings> for QueueConfig {
    fn from(settings: &QueueSettings) -> Self {
        Self {
            capacity: settings.capacity,
            memory_slots: settings.memory_slots,
            overflow_path: settings.overflow_path.clone(),
        }
    }
}

/// Bounded MPMC queue of captured records
pub struct CaptureQueue {
    memory: ArrayQueue<TestRecord>,
    overflow: Option<Mutex<OverflowBuffer>>,
    capacity: usize,

    /// Reserved slots across memory and disk
    pending: AtomicUsize,

    push_count: AtomicU64,
    pop_count: AtomicU64,
    drop_count: AtomicU64,
}

impl CaptureQueue {
    /// In-memory queue holding at most `capacity` records
    pub fn new(capacity: usize) -> Self {
        Self {
            memory: ArrayQueue::new(capacity.max(1)),
            overflow: None,
            capacity,
            pending: AtomicUsize::new(0),
            push_count: AtomicU64::new(0),
            pop_count: AtomicU64::new(0),
            drop_count: AtomicU64::new(0),
        }
    }

    /// Queue with optional disk overflow
    ///
    /// Records recovered from an existing spill file count against capacity.
    pub fn with_config(config: &QueueConfig) -> Result<Self> {
        if config.capacity == 0 {
            return Err(EngineError::ConfigError(
                "Queue capacity must be positive".to_string(),
            ));
        }

        let slots = config.resolved_memory_slots();
        if slots == 0 {
            return Err(EngineError::ConfigError(
                "Queue memory slots must be positive".to_string(),
            ));
        }

        let mut queue = Self::new(config.capacity);
        queue.memory = ArrayQueue::new(slots);

        if let Some(path) = &config.overflow_path {
            let buffer = OverflowBuffer::open(path, DEFAULT_SPILL_BYTES)?;
            let recovered = buffer.len();
            if recovered > 0 {
                info!("Capture queue resumed with {} spilled records", recovered);
            }
            queue.pending = AtomicUsize::new(recovered);
            queue.overflow = Some(Mutex::new(buffer));
        }

        info!(
            "Capture queue ready: capacity {}, {} in memory, overflow {}",
            config.capacity,
            slots,
            if queue.overflow.is_some() { "on" } else { "off" }
        );

        Ok(queue)
    }

    /// Offer a record; false when the queue is full
    pub fn enqueue(&self, record: TestRecord) -> bool {
        if !self.reserve() {
            self.reject(record.id(), "queue at capacity");
            return false;
        }

        let record = match self.memory.push(record) {
            Ok(()) => return self.accepted(),
            Err(record) => record,
        };

        let Some(overflow) = &self.overflow else {
            self.release(1);
            self.reject(record.id(), "memory slots exhausted");
            return false;
        };

        let spilled = serde_json::to_vec(&record)
            .map_err(|e| EngineError::serde(Codec::Json, e))
            .and_then(|bytes| overflow.lock().push(&bytes));

        match spilled {
            Ok(()) => self.accepted(),
            Err(e) => {
                self.release(1);
                self.reject(record.id(), &e.to_string());
                false
            }
        }
    }

    /// Take every queued record, memory first, then spilled
    pub fn drain(&self) -> Vec<TestRecord> {
        let in_memory = self.memory.len();
        let mut records = Vec::with_capacity(in_memory);

        for _ in 0..in_memory {
            match self.memory.pop() {
                Some(record) => {
                    self.release(1);
                    records.push(record);
                }
                None => break,
            }
        }

        if let Some(overflow) = &self.overflow {
            let frames = overflow.lock().drain();
            match frames {
                Ok(frames) => {
                    self.release(frames.len());
                    for frame in frames {
                        match serde_json::from_slice::<TestRecord>(&frame) {
                            Ok(record) => records.push(record),
                            Err(e) => error!("Discarding unreadable spilled record: {}", e),
                        }
                    }
                }
                Err(e) => error!("Failed to drain spill file: {}", e),
            }
        }

        self.pop_count
            .fetch_add(records.len() as u64, Ordering::Relaxed);
        records
    }

    fn reserve(&self) -> bool {
        self.pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.capacity).then_some(n + 1)
            })
            .is_ok()
    }

    fn release(&self, n: usize) {
        let _ = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |p| {
                Some(p.saturating_sub(n))
            });
    }

    fn accepted(&self) -> bool {
        self.push_count.fetch_add(1, Ordering::Relaxed);
        counter!(CAPTURE_ENQUEUED).increment(1);
        true
    }

    fn reject(&self, id: &str, reason: &str) {
        self.drop_count.fetch_add(1, Ordering::Relaxed);
        counter!(CAPTURE_DROPPED).increment(1);
        warn!("Dropped capture {}: {}", id, reason);
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            push_count: self.push_count.load(Ordering::Relaxed),
            pop_count: self.pop_count.load(Ordering::Relaxed),
            drop_count: self.drop_count.load(Ordering::Relaxed),
            current_size: self.len(),
            capacity: self.capacity,
        }
    }

    /// Records currently held, memory and disk combined
    pub fn len(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn memory_slots(&self) -> usize {
        self.memory.capacity()
    }
}

/// Queue statistics
#[derive(Debug, Clone)]
pub struct QueueStats {
    /// Records accepted
    pub push_count: u64,

    /// Records handed to the persister
    pub pop_count: u64,

    /// Records refused at capacity
    pub drop_count: u64,

    pub current_size: usize,
    pub capacity: usize,
}

impl QueueStats {
    pub fn fill_percentage(&self) -> f64 {
        (self.current_size as f64 / self.capacity as f64) * 100.0
    }

    /// Share of offered records that were dropped
    pub fn drop_rate(&self) -> f64 {
        let offered = self.push_count + self.drop_count;
        if offered == 0 {
            0.0
        } else {
            (self.drop_count as f64 / offered as f64) * 100.0
        }
    }
}
