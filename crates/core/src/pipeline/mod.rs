//! Command vocabulary shared by every pipeline stage.

mod error;
mod http_mapping;
mod reporter;
mod types;
mod validation;

pub use error::{CommandError, DependencyError, FieldViolation, Step, ValidationError};
pub use http_mapping::command_error_to_status_code;
pub use reporter::Reporter;
pub use types::{
    is_owner, is_owner_of_all, ActorContext, CommandInput, CommandOutput, CommandResult, Verb,
};
pub use validation::{missing_required, unwritable_fields, validate_id, validate_input};
