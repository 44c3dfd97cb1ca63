//! Optimization ledger: one SQLite table mapping an item key to the last
//! status we asked the media server for.
//!
//! External modules should import from `ondeck_optimizer::db`; the repository
//! API is re-exported here.

pub mod repo;

pub use repo::*;
