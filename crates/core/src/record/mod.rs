//! Records, identifiers and data clauses.
//!
//! A [`Record`] is a JSON object that always carries an `id` and an `isActive`
//! flag. Everything else is entity specific and opaque to the pipeline.

mod error;
mod schema;
mod types;

pub use error::RecordError;
pub use schema::EntitySchema;
pub use types::{
    DataClause, EntityId, EntityType, Record, ACTIVE_FIELD, CREATED_AT_FIELD, ID_FIELD,
    SYSTEM_FIELDS, UPDATED_AT_FIELD, VERSION_FIELD,
};
