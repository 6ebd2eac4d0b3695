//! Record store drivers and the persistence adapter built on top of them.
//!
//! # Feature Flags
//!
//! - `sqlite` (default): SQLite driver using `rusqlite` and `tokio-rusqlite`
//!
//! The in-memory driver is always compiled; it backs tests and `--ephemeral`
//! runs.

mod adapter;
pub mod inmemory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use adapter::{Mutation, PersistenceAdapter};
pub use inmemory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
