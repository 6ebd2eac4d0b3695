//! Cache and event bus backends.
//!
//! Concrete implementations of `entityflow_core::cache::Cache` and
//! `entityflow_core::events::EventBus`.
//!
//! # Feature Flags
//!
//! - `memory` (default): the binary wires the in-memory backends
//! - `redis`: the binary wires the Redis backends
//!
//! These features are mutually exclusive. The in-memory backends are always
//! compiled so tests and embedders can use them regardless of the selection.

// Compile-time checks for mutual exclusivity
#[cfg(all(feature = "memory", feature = "redis"))]
compile_error!(
    "Features 'memory' and 'redis' are mutually exclusive. \
    Enable only one cache backend at a time."
);

#[cfg(not(any(feature = "memory", feature = "redis")))]
compile_error!(
    "No cache backend selected. Enable 'memory' or 'redis' feature. \
    Example: cargo build -p entityflow --no-default-features --features sqlite,redis"
);

pub mod memory;

#[cfg(feature = "redis")]
pub mod redis_impl;

pub use memory::{MemoryCache, MemoryEventBus};

#[cfg(feature = "redis")]
pub use redis_impl::{RedisCache, RedisEventBus};
