use thiserror::Error;

/// Errors raised by record stores and the persistence adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: String, id: String },
    #[error("{entity_type} violates unique constraint on ({})", .fields.join(", "))]
    Conflict {
        entity_type: String,
        fields: Vec<String>,
    },
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Store call timed out after {0}ms")]
    Timeout(u64),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl RepositoryError {
    /// Errors worth retrying: the store may recover on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_) | Self::Timeout(_))
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let error = RepositoryError::NotFound {
            entity_type: "saleTransaction".to_string(),
            id: "abc-123".to_string(),
        };
        assert_eq!(error.to_string(), "saleTransaction not found: abc-123");
    }

    #[test]
    fn test_conflict_display_lists_fields() {
        let error = RepositoryError::Conflict {
            entity_type: "storeAssignment".to_string(),
            fields: vec!["userId".to_string(), "storeId".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "storeAssignment violates unique constraint on (userId, storeId)"
        );
    }

    #[test]
    fn test_timeout_display() {
        assert_eq!(
            RepositoryError::Timeout(250).to_string(),
            "Store call timed out after 250ms"
        );
    }

    #[test]
    fn test_transient_errors() {
        assert!(RepositoryError::Timeout(1).is_transient());
        assert!(RepositoryError::ConnectionFailed("down".to_string()).is_transient());
        assert!(!RepositoryError::QueryFailed("syntax".to_string()).is_transient());
        assert!(!RepositoryError::InvalidData("bad".to_string()).is_transient());
    }
}
