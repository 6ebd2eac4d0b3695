//! Query cache.
//!
//! Memoizes `get` and `list` results per entity type over any [`Cache`]
//! backend. Keys embed the entity's cache generation:
//!
//! - readers read the generation before querying the store and populate under
//!   that generation's key
//! - `invalidate` bumps the generation first, then deletes the old keys
//!
//! A populate that loses the race against an invalidation therefore lands
//! under a generation nobody reads any more and simply expires.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use entityflow_core::cache::{
    decode, encode, entity_pattern, generation_key, parse_counter, query_key, Cache, CacheError,
    QueryKind,
};
use entityflow_core::record::EntityType;

/// Where a cache miss should be stored once the store answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSlot {
    key: String,
}

impl CacheSlot {
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Result of a cache lookup.
#[derive(Debug, PartialEq)]
pub enum Lookup<T> {
    Hit(T),
    Miss(CacheSlot),
    /// The cache could not be consulted; read the store and skip populating.
    Bypass,
}

#[derive(Clone)]
pub struct QueryCache {
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl QueryCache {
    pub fn new(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    async fn generation(&self, entity: &EntityType) -> Result<u64, CacheError> {
        let bytes = self.cache.get(&generation_key(entity)).await?;
        parse_counter(bytes.as_deref())
    }

    /// Looks up a cached read. Cache failures degrade to [`Lookup::Bypass`].
    pub async fn lookup<T: DeserializeOwned>(
        &self,
        entity: &EntityType,
        kind: QueryKind,
        fingerprint: &str,
    ) -> Lookup<T> {
        let generation = match self.generation(entity).await {
            Ok(generation) => generation,
            Err(err) => {
                tracing::warn!(entity_type = %entity, error = %err, "Cache generation unavailable");
                return Lookup::Bypass;
            }
        };

        let key = query_key(entity, generation, kind, fingerprint);
        match self.cache.get(&key).await {
            Ok(Some(bytes)) => match decode(&bytes) {
                Ok(value) => {
                    tracing::trace!(entity_type = %entity, %kind, generation, "Cache hit");
                    return Lookup::Hit(value);
                }
                Err(err) => {
                    tracing::warn!(entity_type = %entity, error = %err, "Cached value unreadable");
                }
            },
            Ok(None) => {}
            Err(err) if err.is_unavailable() => {
                tracing::warn!(entity_type = %entity, error = %err, "Cache read failed");
                return Lookup::Bypass;
            }
            Err(err) => {
                // One bad entry; the populate overwrites it.
                tracing::warn!(entity_type = %entity, error = %err, "Cache entry unreadable");
            }
        }

        tracing::trace!(entity_type = %entity, %kind, generation, "Cache miss");
        Lookup::Miss(CacheSlot { key })
    }

    /// Stores a freshly read value. Failures are logged and ignored.
    pub async fn populate<T: Serialize>(&self, slot: CacheSlot, value: &T) {
        let bytes = match encode(value) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(key = %slot.key, error = %err, "Failed to encode cache value");
                return;
            }
        };
        if let Err(err) = self.cache.set(&slot.key, &bytes, Some(self.ttl)).await {
            tracing::warn!(key = %slot.key, error = %err, "Failed to populate cache");
        }
    }

    /// Drops every cached read of an entity type.
    pub async fn invalidate(&self, entity: &EntityType) -> Result<(), CacheError> {
        let generation = self.cache.incr(&generation_key(entity)).await?;
        self.cache.delete_pattern(&entity_pattern(entity)).await?;
        tracing::debug!(entity_type = %entity, generation, "Invalidated query cache");
        Ok(())
    }
}
