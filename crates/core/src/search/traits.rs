use async_trait::async_trait;

use crate::record::{EntityId, EntityType, Record};

use super::Result;

/// Keeps a secondary search index in step with committed records.
///
/// All operations are idempotent: indexing the same record twice or removing
/// an absent document succeeds.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Inserts or replaces the document for a record.
    async fn index_or_update(&self, entity: &EntityType, record: &Record) -> Result<()>;

    /// Indexes many records at once.
    async fn index_bulk(&self, entity: &EntityType, records: &[Record]) -> Result<()>;

    /// Removes the document for a record id.
    async fn remove(&self, entity: &EntityType, id: &EntityId) -> Result<()>;
}
