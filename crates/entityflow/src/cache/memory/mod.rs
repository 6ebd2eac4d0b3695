//! In-memory cache and event bus for single-instance deployments.

mod cache;
mod pubsub;

pub use cache::MemoryCache;
pub use pubsub::MemoryEventBus;
