//! SQLite row conversion functions.
//!
//! Pure functions for converting between SQLite rows and records.
//! These are testable in isolation without database access.

use rusqlite::types::Type;
use rusqlite::Row;

use entityflow_core::record::{Record, CREATED_AT_FIELD, UPDATED_AT_FIELD};
use entityflow_core::storage::RepositoryError;

/// Column values written for one record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordRow {
    pub id: String,
    pub is_active: bool,
    pub data: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Flattens a record into its row representation.
pub fn record_to_row(record: &Record) -> Result<RecordRow, RepositoryError> {
    let data = serde_json::to_string(record.fields())
        .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

    Ok(RecordRow {
        id: record.id_str().to_string(),
        is_active: record.is_active(),
        data,
        created_at: record.str_field(CREATED_AT_FIELD).unwrap_or_default().to_string(),
        updated_at: record.str_field(UPDATED_AT_FIELD).unwrap_or_default().to_string(),
    })
}

/// Convert a SQLite row to a Record.
///
/// Expected columns: data
pub fn row_to_record(row: &Row) -> rusqlite::Result<Record> {
    let data: String = row.get(0)?;
    parse_record(&data)
}

/// Parse the JSON `data` column.
pub fn parse_record(data: &str) -> rusqlite::Result<Record> {
    let value: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    Record::try_from(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}
