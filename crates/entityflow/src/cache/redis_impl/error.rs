//! Redis error mapping.

use entityflow_core::cache::CacheError;
use entityflow_core::events::EventError;

fn is_connection_error(err: &redis::RedisError) -> bool {
    err.is_connection_refusal() || err.is_timeout() || err.is_connection_dropped()
}

/// Maps Redis errors to CacheError.
pub fn map_redis_error(err: redis::RedisError) -> CacheError {
    if is_connection_error(&err) {
        CacheError::ConnectionFailed(err.to_string())
    } else {
        CacheError::OperationFailed(err.to_string())
    }
}

/// Maps Redis errors to EventError.
pub fn map_redis_event_error(err: redis::RedisError) -> EventError {
    if is_connection_error(&err) {
        EventError::ConnectionFailed(err.to_string())
    } else {
        EventError::PublishFailed(err.to_string())
    }
}
