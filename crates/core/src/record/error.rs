use thiserror::Error;

/// Errors raised when a JSON value cannot be treated as a record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("Record must be a JSON object")]
    NotAnObject,
    #[error("Record is missing a string id")]
    MissingId,
    #[error("Record id cannot be empty")]
    EmptyId,
    #[error("Record isActive flag must be a boolean")]
    InvalidActiveFlag,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_error_display() {
        assert_eq!(
            RecordError::NotAnObject.to_string(),
            "Record must be a JSON object"
        );
        assert_eq!(
            RecordError::MissingId.to_string(),
            "Record is missing a string id"
        );
        assert_eq!(
            RecordError::InvalidActiveFlag.to_string(),
            "Record isActive flag must be a boolean"
        );
    }
}
