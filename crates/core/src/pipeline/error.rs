use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::predicate::PredicateError;
use crate::record::{EntityId, EntityType};
use crate::storage::RepositoryError;

use super::Verb;

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Input rejected before any I/O.
#[derive(Debug, Error, Clone, PartialEq, Eq, Default, Serialize)]
#[error("Validation failed: {}", join_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(FieldViolation::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            violations: vec![FieldViolation::new(field, message)],
        }
    }

    pub fn push(&mut self, violation: FieldViolation) {
        self.violations.push(violation);
    }

    pub fn extend(&mut self, violations: impl IntoIterator<Item = FieldViolation>) {
        self.violations.extend(violations);
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// `Ok` when nothing was collected.
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Post-commit stage a dependency failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    CacheInvalidate,
    Reindex,
    Cascade,
    CascadeChild,
    AggregatedWrite,
    PublishEvent,
}

impl Step {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CacheInvalidate => "cache_invalidate",
            Self::Reindex => "reindex",
            Self::Cascade => "cascade",
            Self::CascadeChild => "cascade_child",
            Self::AggregatedWrite => "aggregated_write",
            Self::PublishEvent => "publish_event",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A post-commit step that failed after the primary write succeeded.
///
/// Never returned to the command caller; handed to the reporter instead.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{step} failed for {entity_type} {entity_id} during {operation}: {cause}")]
pub struct DependencyError {
    pub step: Step,
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub operation: Verb,
    pub cause: String,
}

impl DependencyError {
    pub fn new(
        step: Step,
        entity_type: EntityType,
        entity_id: EntityId,
        operation: Verb,
        cause: impl fmt::Display,
    ) -> Self {
        Self {
            step,
            entity_type,
            entity_id,
            operation,
            cause: cause.to_string(),
        }
    }
}

/// Failure of the primary operation of a command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Invalid filter: {0}")]
    Filter(#[from] PredicateError),
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: String, id: String },
    #[error("{entity_type} violates unique constraint on ({})", .fields.join(", "))]
    Conflict {
        entity_type: String,
        fields: Vec<String>,
    },
    #[error("Unknown entity type: {0}")]
    UnknownEntity(EntityType),
    #[error("Store error: {0}")]
    Store(RepositoryError),
}

impl From<RepositoryError> for CommandError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound { entity_type, id } => Self::NotFound { entity_type, id },
            RepositoryError::Conflict {
                entity_type,
                fields,
            } => Self::Conflict {
                entity_type,
                fields,
            },
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_joins_violations() {
        let mut error = ValidationError::single("amount", "is required");
        error.push(FieldViolation::new("currency", "is required"));
        assert_eq!(
            error.to_string(),
            "Validation failed: amount: is required; currency: is required"
        );
    }

    #[test]
    fn test_validation_error_into_result() {
        assert!(ValidationError::default().into_result().is_ok());
        assert!(ValidationError::single("id", "is required")
            .into_result()
            .is_err());
    }

    #[test]
    fn test_dependency_error_display() {
        let error = DependencyError::new(
            Step::CascadeChild,
            EntityType::new("storeAssignment"),
            EntityId::new("c1"),
            Verb::Delete,
            "Store call timed out after 5000ms",
        );
        assert_eq!(
            error.to_string(),
            "cascade_child failed for storeAssignment c1 during delete: Store call timed out after 5000ms"
        );
    }

    #[test]
    fn test_repository_errors_map_to_command_errors() {
        let not_found: CommandError = RepositoryError::NotFound {
            entity_type: "store".to_string(),
            id: "s1".to_string(),
        }
        .into();
        assert!(matches!(not_found, CommandError::NotFound { .. }));

        let conflict: CommandError = RepositoryError::Conflict {
            entity_type: "store".to_string(),
            fields: vec!["name".to_string()],
        }
        .into();
        assert_eq!(
            conflict.to_string(),
            "store violates unique constraint on (name)"
        );

        let store: CommandError = RepositoryError::Timeout(10).into();
        assert_eq!(store, CommandError::Store(RepositoryError::Timeout(10)));
    }
}
