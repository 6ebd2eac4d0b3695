//! SQLite schema definitions and SQL query constants.
//!
//! Every entity type shares the `records` table. The full record is kept as
//! JSON in `data`; `is_active`, `created_at` and `updated_at` are copied out
//! of it so the common filters can use an index.

/// SQL statement to create all tables.
pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    entity_type TEXT NOT NULL,
    id TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    data TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (entity_type, id)
);

CREATE INDEX IF NOT EXISTS idx_records_entity_active ON records(entity_type, is_active);
"#;

pub const INSERT_RECORD: &str = r#"
INSERT INTO records (entity_type, id, is_active, data, created_at, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
"#;

pub const SELECT_RECORD_BY_ID: &str = r#"
SELECT data
FROM records
WHERE entity_type = ?1 AND id = ?2
"#;

pub const REPLACE_RECORD: &str = r#"
UPDATE records
SET is_active = ?3, data = ?4, updated_at = ?5
WHERE entity_type = ?1 AND id = ?2
"#;

/// Prefix for predicate selects; the caller appends `AND (<predicate>)`.
pub const SELECT_RECORDS: &str = "SELECT data FROM records WHERE entity_type = ?";

/// Prefix for predicate counts; the caller appends `AND (<predicate>)`.
pub const COUNT_RECORDS: &str = "SELECT COUNT(*) FROM records WHERE entity_type = ?";
