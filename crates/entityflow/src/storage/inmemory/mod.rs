//! In-memory record store.
//!
//! Keeps every entity type in its own `BTreeMap` behind `Arc<RwLock<_>>` and
//! evaluates predicates with the pure evaluator from `entityflow_core`.
//!
//! ```rust,ignore
//! use entityflow::storage::InMemoryStore;
//!
//! let store = InMemoryStore::new();
//! ```

mod repository;

pub use repository::InMemoryStore;
