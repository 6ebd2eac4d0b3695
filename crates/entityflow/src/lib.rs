//! Imperative shell of the entityflow command pipeline.
//!
//! Wires the pure types of `entityflow_core` to concrete backends: record
//! stores, query cache, search index, event bus and a bounded task queue for
//! post-commit work. [`pipeline::Pipeline`] is the entry point.

pub mod cache;
pub mod cascade;
pub mod catalog;
pub mod config;
pub mod pipeline;
pub mod query_cache;
pub mod reporter;
pub mod search;
pub mod storage;
pub mod tasks;

pub use config::Config;
pub use pipeline::{EntityDefinition, EntityRegistry, Pipeline};
