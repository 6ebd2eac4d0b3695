use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use entityflow_core::query::{select, ListQuery, ListResult};
use entityflow_core::record::{EntityId, EntityType, Record};
use entityflow_core::storage::{RecordStore, RepositoryError, Result};

type Table = BTreeMap<String, Record>;

/// Non-persistent record store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<HashMap<EntityType, Table>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows stored for an entity type, active or not.
    pub async fn row_count(&self, entity: &EntityType) -> usize {
        self.tables
            .read()
            .await
            .get(entity)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn fetch(&self, entity: &EntityType, id: &EntityId) -> Result<Option<Record>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(entity)
            .and_then(|table| table.get(id.as_str()))
            .cloned())
    }

    async fn select(&self, entity: &EntityType, query: &ListQuery) -> Result<ListResult> {
        let tables = self.tables.read().await;
        match tables.get(entity) {
            Some(table) => Ok(select(table.values(), query)),
            None => Ok(ListResult::default()),
        }
    }

    async fn insert(&self, entity: &EntityType, record: &Record) -> Result<()> {
        let mut tables = self.tables.write().await;
        let table = tables.entry(entity.clone()).or_default();
        if table.contains_key(record.id_str()) {
            return Err(RepositoryError::Conflict {
                entity_type: entity.to_string(),
                fields: vec!["id".to_string()],
            });
        }
        table.insert(record.id_str().to_string(), record.clone());
        Ok(())
    }

    async fn replace(&self, entity: &EntityType, record: &Record) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables
            .get_mut(entity)
            .and_then(|table| table.get_mut(record.id_str()))
        {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound {
                entity_type: entity.to_string(),
                id: record.id_str().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use entityflow_core::predicate::{CompareOp, Predicate};
    use entityflow_core::query::{Pagination, Sort};
    use entityflow_core::record::DataClause;

    use super::*;

    fn widget() -> EntityType {
        EntityType::new("widget")
    }

    fn record(id: &str, name: &str, price: i64) -> Record {
        Record::new(
            EntityId::new(id),
            DataClause::new().with("name", name).with("price", price),
        )
    }

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let store = InMemoryStore::new();
        let w = record("w1", "Widget", 10);
        store.insert(&widget(), &w).await.unwrap();

        let fetched = store.fetch(&widget(), &EntityId::new("w1")).await.unwrap();
        assert_eq!(fetched, Some(w));
        assert!(store
            .fetch(&EntityType::new("gadget"), &EntityId::new("w1"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_insert_duplicate_id_conflicts() {
        let store = InMemoryStore::new();
        store.insert(&widget(), &record("w1", "A", 1)).await.unwrap();
        let err = store
            .insert(&widget(), &record("w1", "B", 2))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_replace_requires_existing_row() {
        let store = InMemoryStore::new();
        let err = store
            .replace(&widget(), &record("w1", "A", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));

        store.insert(&widget(), &record("w1", "A", 1)).await.unwrap();
        store
            .replace(&widget(), &record("w1", "B", 2))
            .await
            .unwrap();
        let fetched = store
            .fetch(&widget(), &EntityId::new("w1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.str_field("name"), Some("B"));
    }

    #[tokio::test]
    async fn test_select_filters_sorts_and_pages() {
        let store = InMemoryStore::new();
        for (id, name, price) in [("a", "Alpha", 30), ("b", "Beta", 10), ("c", "Gamma", 20)] {
            store.insert(&widget(), &record(id, name, price)).await.unwrap();
        }

        let query = ListQuery::new(Predicate::compare("price", CompareOp::Gte, 15))
            .with_sort(vec![Sort::asc("price")])
            .with_pagination(Some(Pagination::new(1, 1)));
        let result = store.select(&widget(), &query).await.unwrap();

        assert_eq!(result.total, 2);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].id_str(), "c");
        assert_eq!(store.row_count(&widget()).await, 3);
    }
}
