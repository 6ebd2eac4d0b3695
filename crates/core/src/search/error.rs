use thiserror::Error;

/// Errors raised by a search index.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("Search index unavailable: {0}")]
    Unavailable(String),
    #[error("Search index rejected document {id}: {reason}")]
    Rejected { id: String, reason: String },
}

pub type Result<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_error_display() {
        assert_eq!(
            SearchError::Unavailable("connection reset".to_string()).to_string(),
            "Search index unavailable: connection reset"
        );
        assert_eq!(
            SearchError::Rejected {
                id: "t-1".to_string(),
                reason: "mapping conflict".to_string(),
            }
            .to_string(),
            "Search index rejected document t-1: mapping conflict"
        );
    }
}
