//! Redis cache and event bus for multi-instance deployments.

mod cache;
mod error;
mod pubsub;

pub use cache::RedisCache;
pub use pubsub::RedisEventBus;
