//! Pure mapping from command errors to HTTP-style status codes.

use super::CommandError;
use crate::storage::repository_error_to_status_code;

/// Maps a [`CommandError`] to a status code.
///
/// Input problems are 400, missing rows 404, uniqueness violations 409.
/// Store failures defer to [`repository_error_to_status_code`].
pub fn command_error_to_status_code(error: &CommandError) -> u16 {
    match error {
        CommandError::Validation(_) | CommandError::Filter(_) => 400,
        CommandError::UnknownEntity(_) => 400,
        CommandError::NotFound { .. } => 404,
        CommandError::Conflict { .. } => 409,
        CommandError::Store(inner) => repository_error_to_status_code(inner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ValidationError;
    use crate::predicate::PredicateError;
    use crate::record::EntityType;
    use crate::storage::RepositoryError;

    #[test]
    fn test_input_errors_map_to_400() {
        let validation = CommandError::Validation(ValidationError::single("id", "is required"));
        assert_eq!(command_error_to_status_code(&validation), 400);

        let filter = CommandError::Filter(PredicateError::EmptyGroup);
        assert_eq!(command_error_to_status_code(&filter), 400);

        let unknown = CommandError::UnknownEntity(EntityType::new("ghost"));
        assert_eq!(command_error_to_status_code(&unknown), 400);
    }

    #[test]
    fn test_not_found_and_conflict() {
        let not_found = CommandError::NotFound {
            entity_type: "store".to_string(),
            id: "s1".to_string(),
        };
        assert_eq!(command_error_to_status_code(&not_found), 404);

        let conflict = CommandError::Conflict {
            entity_type: "store".to_string(),
            fields: vec!["name".to_string()],
        };
        assert_eq!(command_error_to_status_code(&conflict), 409);
    }

    #[test]
    fn test_store_errors_defer_to_repository_mapping() {
        let timeout = CommandError::Store(RepositoryError::Timeout(5000));
        assert_eq!(command_error_to_status_code(&timeout), 503);

        let query = CommandError::Store(RepositoryError::QueryFailed("bad".to_string()));
        assert_eq!(command_error_to_status_code(&query), 500);
    }
}
