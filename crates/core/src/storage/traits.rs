use async_trait::async_trait;

use crate::query::{ListQuery, ListResult};
use crate::record::{EntityId, EntityType, Record};

use super::Result;

/// Low-level record storage driver.
///
/// Drivers store whole records per entity type and evaluate predicates
/// natively. They know nothing about soft deletion, uniqueness or metadata;
/// the persistence adapter layers those rules on top.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetches a row by id regardless of its active flag.
    async fn fetch(&self, entity: &EntityType, id: &EntityId) -> Result<Option<Record>>;

    /// Returns one page of rows matching the query, plus the total match count.
    async fn select(&self, entity: &EntityType, query: &ListQuery) -> Result<ListResult>;

    /// Inserts a new row. Fails if the id already exists.
    async fn insert(&self, entity: &EntityType, record: &Record) -> Result<()>;

    /// Replaces an existing row. Fails with `NotFound` if the id is unknown.
    async fn replace(&self, entity: &EntityType, record: &Record) -> Result<()>;
}
