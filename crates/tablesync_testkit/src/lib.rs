//! # tablesync Testkit
//!
//! Test utilities for tablesync.
//!
//! This crate provides:
//! - SQLite fixtures with a ready-made `person` table
//! - Store wrappers that simulate outages and transient failures
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tablesync_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_person_table() {
//!     let store = person_store();
//!     insert_person(&store, 1, "Alice", "alice@demo", fixed_time());
//!     assert_eq!(count_rows(&store, "person"), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
