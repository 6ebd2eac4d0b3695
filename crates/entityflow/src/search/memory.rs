//! In-memory search index.
//!
//! Holds the latest indexed copy of every record and answers naive
//! case-insensitive substring searches over string fields.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use entityflow_core::record::{EntityId, EntityType, Record};
use entityflow_core::search::{Result, SearchIndex};

type Documents = BTreeMap<String, Record>;

#[derive(Debug, Clone, Default)]
pub struct MemorySearchIndex {
    documents: Arc<RwLock<HashMap<EntityType, Documents>>>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexed documents whose string fields contain `text`, in id order.
    pub async fn search(&self, entity: &EntityType, text: &str) -> Vec<Record> {
        let needle = text.to_lowercase();
        let documents = self.documents.read().await;
        documents
            .get(entity)
            .map(|docs| {
                docs.values()
                    .filter(|record| {
                        record.fields().values().any(|value| match value {
                            Value::String(s) => s.to_lowercase().contains(&needle),
                            _ => false,
                        })
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The indexed copy of one document.
    pub async fn document(&self, entity: &EntityType, id: &EntityId) -> Option<Record> {
        let documents = self.documents.read().await;
        documents.get(entity).and_then(|docs| docs.get(id.as_str()).cloned())
    }

    /// Number of indexed documents for an entity type.
    pub async fn len(&self, entity: &EntityType) -> usize {
        let documents = self.documents.read().await;
        documents.get(entity).map(BTreeMap::len).unwrap_or(0)
    }
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    async fn index_or_update(&self, entity: &EntityType, record: &Record) -> Result<()> {
        let mut documents = self.documents.write().await;
        documents
            .entry(entity.clone())
            .or_default()
            .insert(record.id_str().to_string(), record.clone());
        Ok(())
    }

    async fn index_bulk(&self, entity: &EntityType, records: &[Record]) -> Result<()> {
        let mut documents = self.documents.write().await;
        let docs = documents.entry(entity.clone()).or_default();
        for record in records {
            docs.insert(record.id_str().to_string(), record.clone());
        }
        Ok(())
    }

    async fn remove(&self, entity: &EntityType, id: &EntityId) -> Result<()> {
        let mut documents = self.documents.write().await;
        if let Some(docs) = documents.get_mut(entity) {
            docs.remove(id.as_str());
        }
        Ok(())
    }
}
