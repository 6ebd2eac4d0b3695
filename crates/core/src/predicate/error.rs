use thiserror::Error;

use super::CompareOp;

/// Errors raised while compiling a filter expression.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PredicateError {
    #[error("Unknown filter field: {0}")]
    UnknownField(String),
    #[error("Operator {op} on {field} expects a list value")]
    ExpectedList { field: String, op: CompareOp },
    #[error("Operator {op} on {field} expects a scalar value")]
    ExpectedScalar { field: String, op: CompareOp },
    #[error("Operator {op} on {field} expects a boolean value")]
    ExpectedBool { field: String, op: CompareOp },
    #[error("Filter groups cannot be empty")]
    EmptyGroup,
}
