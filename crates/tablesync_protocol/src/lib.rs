//! # tablesync Protocol
//!
//! Row model, table configuration and the pure parts of the sync
//! algorithm for tablesync.
//!
//! This crate provides:
//! - [`Value`], [`Row`] and [`RowSet`] for fetched table data
//! - [`TableSyncConfig`] describing one synchronized table
//! - [`SyncOperation`] for queued row changes
//! - The differencer ([`diff`]) and the [`ConflictResolver`]
//! - [`SyncLogEntry`] audit records
//!
//! This is a pure crate with no I/O operations. Fetching and applying
//! rows live in `tablesync_engine`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod conflict;
mod diff;
mod log;
mod operation;
mod value;

pub use config::{is_valid_identifier, ConfigError, ConfigResult, TableSyncConfig};
pub use conflict::{tracking_timestamp, ConflictResolver, TieBreak};
pub use diff::{comparison_columns, diff, rows_differ, DiffEntry, KeyDiff, TableDiff};
pub use log::{LogOperation, LogStatus, SyncLogEntry};
pub use operation::{OperationKind, StoreId, SyncOperation};
pub use value::{format_timestamp, parse_timestamp, Row, RowSet, Value};
