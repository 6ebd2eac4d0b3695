use thiserror::Error;

/// Errors raised by cache backends and the query cache helpers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A generation counter holds something other than ASCII digits.
    #[error("Corrupt cache generation: {0:?}")]
    CorruptGeneration(String),
}

impl CacheError {
    /// Whether the backend itself is unreachable, as opposed to one bad entry.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_))
    }
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
