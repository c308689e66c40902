// src/replay/mod.rs
//! Replay of captured records against a candidate
//!
//! - **ExecutorRegistry**: `ProtocolTag` to `ReplayExecutor` dispatch
//! - **TargetTable**: client id to base URL, timeout and headers
//! - **HttpReplayExecutor**: hyper client for HTTP records
//! - **MessageReplayExecutor**: broker-agnostic publisher for message records
//! - **ReplayReport** / **Exporter**: verdicts and their JSON or JUnit rendering
//!
//! Every replayed call carries `x-replay-id: <record id>` and
//! `x-replay-mode: TEST`, which the receiving orchestrator uses to resolve
//! TEST mode.

pub mod exporter;
pub mod http_executor;
pub mod message_executor;
pub mod registry;
pub mod report;
pub mod targets;

pub use exporter::{ExportFormat, Exporter};
pub use http_executor::HttpReplayExecutor;
pub use message_executor::{MessagePublisher, MessageReplayExecutor};
pub use registry::{ExecutorRegistry, ReplayExecutor};
pub use report::ReplayReport;
pub use targets::{Target, TargetTable};

/// Header carrying the id of the record being replayed
pub const REPLAY_ID_HEADER: &str = "x-replay-id";

/// Header carrying the mode a request should run in
pub const REPLAY_MODE_HEADER: &str = "x-replay-mode";

/// Mode value attached to replayed calls
pub const REPLAY_MODE_TEST: &str = "TEST";
