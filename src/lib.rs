//! Flat-file region record manager
//!
//! Records (region name, area, population) live one per line in plain-text
//! files inside a working folder. This crate loads them, orders them with a
//! stable comparator, detects existing orderings, finds order-preserving
//! insertion points, and commits every change with a write-to-temp then
//! atomic-rename protocol so a failed update never corrupts the original.

#![warn(clippy::all)]

pub mod error;
pub mod config;

pub mod record;
pub mod loader;
pub mod compare;
pub mod sort;
pub mod order;
pub mod storage;
pub mod rewrite;
pub mod workspace;
pub mod session;

// Re-export commonly used types
pub use compare::{compare, SortDirection, SortKey};
pub use config::{StoreConfig, StoreConfigBuilder};
pub use error::{StoreError, StoreResult};
pub use order::{detect_order, locate_insertion, DetectedOrder};
pub use record::Record;
pub use rewrite::{Change, Committed, Mutation, Rewriter};
pub use session::Session;
pub use storage::{FsStorage, Storage};

/// Exit codes
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const STORE_FAILURE: i32 = 2;
