//! SQLite storage backend implementation.
//!
//! Uses `rusqlite` for synchronous operations and `tokio-rusqlite` for async
//! wrapping. Predicates are rendered to SQL over `json_extract` on the
//! record's JSON column.

mod conversions;
mod error;
mod predicate;
mod repository;
mod schema;

pub use repository::SqliteStore;
