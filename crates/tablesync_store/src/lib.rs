//! # tablesync Store
//!
//! Store abstraction for tablesync.
//!
//! A store is a relational database reached through parameterized SQL.
//! The engine only ever talks to [`SqlStore`]; it never sees a driver type.
//!
//! ## Design Principles
//!
//! - Statements carry their parameters as [`Value`](tablesync_protocol::Value)s
//! - Rows come back with lowercase column names
//! - Errors are classified as retryable or permanent at this layer
//! - Stores must be `Send + Sync` so one engine can be shared across threads
//!
//! ## Available Backends
//!
//! - [`SqliteStore`] - SQLite database file or in-memory database
//!
//! ## Example
//!
//! ```rust
//! use tablesync_store::{SqlStore, SqliteStore, Statement};
//!
//! let store = SqliteStore::open_in_memory().unwrap();
//! store.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)").unwrap();
//! let inserted = store
//!     .execute(&Statement::new("INSERT INTO t (id, name) VALUES (?, ?)").bind(1).bind("one"))
//!     .unwrap();
//! assert_eq!(inserted, 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod sqlite;
mod statement;

pub use backend::SqlStore;
pub use error::{StoreError, StoreResult};
pub use sqlite::{SqliteStore, StoreSettings, DEFAULT_BUSY_TIMEOUT};
pub use statement::Statement;
