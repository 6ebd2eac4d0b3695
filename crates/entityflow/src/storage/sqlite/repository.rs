//! SQLite record store.
//!
//! Implements `RecordStore` from `entityflow_core::storage` over a single
//! `records` table keyed by `(entity_type, id)`.

use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use tokio_rusqlite::Connection;

use entityflow_core::query::{ListQuery, ListResult};
use entityflow_core::record::{EntityId, EntityType, Record};
use entityflow_core::storage::{RecordStore, RepositoryError, Result};

use super::conversions::{record_to_row, row_to_record};
use super::error::map_tokio_rusqlite_error;
use super::predicate::{render, render_order};
use super::schema;

/// Helper to wrap rusqlite errors for tokio_rusqlite closures.
fn wrap_err(e: rusqlite::Error) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Rusqlite(e)
}

/// SQLite-based record store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a file-based database and its schema.
    pub async fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .await
            .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))?;

        Self::init_schema(&conn).await?;

        Ok(Self { conn })
    }

    /// Creates a store over an in-memory database.
    ///
    /// Useful for testing - data is lost when the connection is dropped.
    pub async fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))?;

        Self::init_schema(&conn).await?;

        Ok(Self { conn })
    }

    async fn init_schema(conn: &Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(schema::CREATE_TABLES)
                .map_err(wrap_err)?;
            Ok(())
        })
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn fetch(&self, entity: &EntityType, id: &EntityId) -> Result<Option<Record>> {
        let entity_str = entity.to_string();
        let id_str = id.to_string();

        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(schema::SELECT_RECORD_BY_ID)
                    .map_err(wrap_err)?;
                match stmt.query_row([&entity_str, &id_str], row_to_record) {
                    Ok(record) => Ok(Some(record)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(wrap_err(e)),
                }
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, entity.as_str()))
    }

    async fn select(&self, entity: &EntityType, query: &ListQuery) -> Result<ListResult> {
        let fragment = render(&query.predicate)?;
        let order = render_order(&query.sort)?;

        let mut params = Vec::with_capacity(fragment.params.len() + 3);
        params.push(SqlValue::Text(entity.to_string()));
        params.extend(fragment.params);

        let count_sql = format!("{} AND ({})", schema::COUNT_RECORDS, fragment.sql);
        let mut select_sql = format!("{} AND ({}) {order}", schema::SELECT_RECORDS, fragment.sql);
        let mut select_params = params.clone();
        if let Some(pagination) = query.pagination {
            select_sql.push_str(" LIMIT ? OFFSET ?");
            select_params.push(SqlValue::Integer(pagination.limit() as i64));
            select_params.push(SqlValue::Integer(pagination.offset() as i64));
        }

        self.conn
            .call(move |conn| {
                let total: i64 = conn
                    .query_row(&count_sql, rusqlite::params_from_iter(params.iter()), |row| {
                        row.get(0)
                    })
                    .map_err(wrap_err)?;

                let mut stmt = conn.prepare(&select_sql).map_err(wrap_err)?;
                let rows = stmt
                    .query_map(
                        rusqlite::params_from_iter(select_params.iter()),
                        row_to_record,
                    )
                    .map_err(wrap_err)?;

                let mut items = Vec::new();
                for row_result in rows {
                    items.push(row_result.map_err(wrap_err)?);
                }

                Ok(ListResult {
                    items,
                    total: u64::try_from(total).unwrap_or_default(),
                })
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, entity.as_str()))
    }

    async fn insert(&self, entity: &EntityType, record: &Record) -> Result<()> {
        let entity_str = entity.to_string();
        let row = record_to_row(record)?;

        self.conn
            .call(move |conn| {
                conn.execute(
                    schema::INSERT_RECORD,
                    rusqlite::params![
                        entity_str,
                        row.id,
                        row.is_active,
                        row.data,
                        row.created_at,
                        row.updated_at
                    ],
                )
                .map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, entity.as_str()))
    }

    async fn replace(&self, entity: &EntityType, record: &Record) -> Result<()> {
        let entity_str = entity.to_string();
        let row = record_to_row(record)?;
        let id = row.id.clone();

        let rows_affected = self
            .conn
            .call(move |conn| {
                let affected = conn
                    .execute(
                        schema::REPLACE_RECORD,
                        rusqlite::params![
                            entity_str,
                            row.id,
                            row.is_active,
                            row.data,
                            row.updated_at
                        ],
                    )
                    .map_err(wrap_err)?;
                Ok(affected)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, entity.as_str()))?;

        if rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity_type: entity.to_string(),
                id,
            });
        }

        Ok(())
    }
}
