//! Pure mapping from repository errors to HTTP-style status codes.

use super::RepositoryError;

/// Maps a [`RepositoryError`] to a status code.
///
/// - `NotFound` -> 404
/// - `Conflict` -> 409
/// - `ConnectionFailed`, `Timeout` -> 503
/// - `QueryFailed`, `Serialization` -> 500
/// - `InvalidData` -> 400
///
/// ```
/// use entityflow_core::storage::{RepositoryError, repository_error_to_status_code};
///
/// let error = RepositoryError::Timeout(5000);
/// assert_eq!(repository_error_to_status_code(&error), 503);
/// ```
pub fn repository_error_to_status_code(error: &RepositoryError) -> u16 {
    match error {
        RepositoryError::NotFound { .. } => 404,
        RepositoryError::Conflict { .. } => 409,
        RepositoryError::ConnectionFailed(_) | RepositoryError::Timeout(_) => 503,
        RepositoryError::QueryFailed(_) | RepositoryError::Serialization(_) => 500,
        RepositoryError::InvalidData(_) => 400,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let error = RepositoryError::NotFound {
            entity_type: "store".to_string(),
            id: "s-1".to_string(),
        };
        assert_eq!(repository_error_to_status_code(&error), 404);
    }

    #[test]
    fn test_conflict_maps_to_409() {
        let error = RepositoryError::Conflict {
            entity_type: "store".to_string(),
            fields: vec!["name".to_string()],
        };
        assert_eq!(repository_error_to_status_code(&error), 409);
    }

    #[test]
    fn test_unavailable_store_maps_to_503() {
        assert_eq!(
            repository_error_to_status_code(&RepositoryError::ConnectionFailed("refused".into())),
            503
        );
        assert_eq!(
            repository_error_to_status_code(&RepositoryError::Timeout(100)),
            503
        );
    }

    #[test]
    fn test_internal_failures_map_to_500() {
        assert_eq!(
            repository_error_to_status_code(&RepositoryError::QueryFailed("x".into())),
            500
        );
        assert_eq!(
            repository_error_to_status_code(&RepositoryError::Serialization("x".into())),
            500
        );
    }

    #[test]
    fn test_invalid_data_maps_to_400() {
        let error = RepositoryError::InvalidData("bad field name".to_string());
        assert_eq!(repository_error_to_status_code(&error), 400);
    }
}
