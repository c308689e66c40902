// src/recording/mod.rs
//! Capture pipeline
//!
//! - **CaptureQueue**: bounded, non-blocking hand-off from request threads
//! - **OverflowBuffer**: memory-mapped spill file absorbing bursts
//! - **CapturePersister**: periodic drain of the queue into a `SinkPort`
//!
//! # Architecture
//!
//! ```text
//! intercept() → enqueue() → ArrayQueue ──┐
//!                    │                   ├→ drain (every purge interval)
//!                    └→ spill file (mmap)┘        ↓
//!                                         SerdeRegistry::encode
//!                                                 ↓
//!                                         SinkPort::write(id, bytes)
//! ```

pub mod capture_queue;
pub mod overflow;
pub mod persister;

pub use capture_queue::{CaptureQueue, QueueConfig, QueueStats};
pub use overflow::OverflowBuffer;
pub use persister::{CapturePersister, DrainSummary, PersisterStats};
