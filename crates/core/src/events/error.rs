use thiserror::Error;

/// Errors raised by an event bus.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("Event bus connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Publish failed: {0}")]
    PublishFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, EventError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_error_display() {
        assert_eq!(
            EventError::PublishFailed("channel closed".to_string()).to_string(),
            "Publish failed: channel closed"
        );
        assert_eq!(
            EventError::ConnectionFailed("refused".to_string()).to_string(),
            "Event bus connection failed: refused"
        );
    }
}
