//! # tablesync Engine
//!
//! Keeps configured tables convergent between two relational stores.
//!
//! This crate provides:
//! - Row fetching with column pruning and watermarks
//! - The operation applier (insert/update/delete with fallback)
//! - Per-target pending queues with exponential backoff
//! - The sync orchestrator ([`SyncEngine`])
//! - Configuration and audit-log collaborators
//! - A periodic [`Scheduler`]
//!
//! ## Architecture
//!
//! One pass of the engine:
//! 1. Replay whatever is pending for store A, then for store B
//! 2. For every active table: fetch both sides, diff, resolve conflicts
//! 3. Queue the resulting operations and flush both queues
//! 4. Record one audit entry per applied or discarded operation and one
//!    per table
//!
//! ## Key Invariants
//!
//! - Store A is authoritative for row existence
//! - Differing rows resolve last-write-wins on the tracking column
//! - A failure in one table never stops the others
//! - Pending operations are retried at most [`RetryConfig::max_attempts`] times
//! - Pending queues live in memory; a restart re-derives them on the next pass

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod applier;
mod clock;
mod config;
mod config_store;
mod engine;
mod error;
mod fetch;
mod log_sink;
mod queue;
mod scheduler;

pub use applier::{apply, ApplyOutcome};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, RetryConfig};
pub use config_store::{ConfigStore, MemoryConfigStore};
pub use engine::{HealthStatus, SyncEngine, SyncPassReport, TableSyncReport};
pub use error::{EngineError, EngineResult};
pub use fetch::{build_select, fetch_rows, fetch_rows_by_key, try_fetch_rows, WATERMARK_SLACK};
pub use log_sink::{LogSink, SyncLogService, DEFAULT_LOG_CAPACITY, MAX_LOG_LIMIT};
pub use queue::{PendingQueues, ReplayStats};
pub use scheduler::{Scheduler, DEFAULT_SYNC_INTERVAL};
