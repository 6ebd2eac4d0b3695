//! In-memory cache with LRU eviction.
//!
//! Mirrors the Redis backend:
//! - query keys are tracked per entity type for cheap pattern deletion
//! - counters live outside the LRU so eviction can never rewind a generation

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;

use entityflow_core::cache::{
    extract_entity_from_key, extract_entity_from_pattern, parse_counter, pattern_matches, Cache,
    Result,
};

/// A single cache entry with optional expiration.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.map(|d| Instant::now() + d);
        Self { value, expires_at }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() > exp)
    }
}

/// Thread-safe in-memory cache.
///
/// Expired entries are dropped lazily when read. Once `max_entries` is
/// reached the least recently used entry is evicted.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    store: Arc<RwLock<LruCache<String, CacheEntry>>>,
    /// entity type -> cached query keys
    tracking: Arc<RwLock<HashMap<String, HashSet<String>>>>,
    counters: Arc<RwLock<HashMap<String, u64>>>,
}

impl MemoryCache {
    /// Creates a cache holding at most `max_entries` values (minimum one).
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            store: Arc::new(RwLock::new(LruCache::new(capacity))),
            tracking: Arc::new(RwLock::new(HashMap::new())),
            counters: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of live values, expired or not.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn untrack(&self, entity: &str, keys: &[String]) {
        let mut tracking = self.tracking.write().await;
        if let Some(tracked) = tracking.get_mut(entity) {
            for key in keys {
                tracked.remove(key);
            }
            if tracked.is_empty() {
                tracking.remove(entity);
            }
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.counters.read().await.get(key) {
            return Ok(Some(value.to_string().into_bytes()));
        }

        let mut store = self.store.write().await;
        match store.get(key) {
            Some(entry) if entry.is_expired() => {
                store.pop(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        {
            let mut store = self.store.write().await;
            store.put(key.to_string(), CacheEntry::new(value.to_vec(), ttl));
        }

        if let Some(entity) = extract_entity_from_key(key) {
            let mut tracking = self.tracking.write().await;
            tracking
                .entry(entity.to_string())
                .or_default()
                .insert(key.to_string());
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if let Some(entity) = extract_entity_from_key(key) {
            self.untrack(entity, &[key.to_string()]).await;
        }
        self.counters.write().await.remove(key);
        self.store.write().await.pop(key);
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        let Some(entity) = extract_entity_from_pattern(pattern) else {
            // Untracked pattern: O(n) scan.
            let mut store = self.store.write().await;
            let doomed: Vec<String> = store
                .iter()
                .filter(|(key, _)| pattern_matches(pattern, key))
                .map(|(key, _)| key.clone())
                .collect();
            for key in doomed {
                store.pop(&key);
            }
            return Ok(());
        };

        let doomed: Vec<String> = {
            let tracking = self.tracking.read().await;
            tracking
                .get(entity)
                .map(|keys| {
                    keys.iter()
                        .filter(|k| pattern_matches(pattern, k))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };

        if !doomed.is_empty() {
            {
                let mut store = self.store.write().await;
                for key in &doomed {
                    store.pop(key);
                }
            }
            self.untrack(entity, &doomed).await;
        }

        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<u64> {
        let mut counters = self.counters.write().await;
        let current = match counters.get(key) {
            Some(value) => *value,
            None => {
                // A counter may have been written with `set` first.
                let stored = self.store.write().await.pop(key);
                parse_counter(stored.as_ref().map(|e| e.value.as_slice()))?
            }
        };
        let next = current + 1;
        counters.insert(key.to_string(), next);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entityflow_core::cache::{entity_pattern, generation_key, query_key, QueryKind};
    use entityflow_core::record::EntityType;

    const TEST_MAX_ENTRIES: usize = 1000;

    fn store() -> EntityType {
        EntityType::new("store")
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        cache.set("test:key", b"test value", None).await.unwrap();
        assert_eq!(
            cache.get("test:key").await.unwrap(),
            Some(b"test value".to_vec())
        );
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        assert_eq!(cache.get("nonexistent:key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        cache.set("test:delete", b"gone", None).await.unwrap();
        cache.delete("test:delete").await.unwrap();
        assert!(cache.get("test:delete").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        cache
            .set("test:ttl", b"short-lived", Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(cache.get("test:ttl").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(cache.get("test:ttl").await.unwrap().is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_pattern_by_entity() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        let assignments = EntityType::new("storeAssignment");

        let key1 = query_key(&store(), 0, QueryKind::Get, "a");
        let key2 = query_key(&store(), 1, QueryKind::List, "b");
        let other = query_key(&assignments, 0, QueryKind::Get, "a");

        cache.set(&key1, b"1", None).await.unwrap();
        cache.set(&key2, b"2", None).await.unwrap();
        cache.set(&other, b"3", None).await.unwrap();
        cache.set("user:123", b"4", None).await.unwrap();

        cache.delete_pattern(&entity_pattern(&store())).await.unwrap();

        assert!(cache.get(&key1).await.unwrap().is_none());
        assert!(cache.get(&key2).await.unwrap().is_none());
        assert!(cache.get(&other).await.unwrap().is_some());
        assert!(cache.get("user:123").await.unwrap().is_some());

        let tracking = cache.tracking.read().await;
        assert!(tracking.get("store").is_none());
        assert!(tracking.get("storeAssignment").is_some());
    }

    #[tokio::test]
    async fn test_delete_removes_from_tracking() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        let key = query_key(&store(), 0, QueryKind::Get, "a");
        cache.set(&key, b"x", None).await.unwrap();
        cache.delete(&key).await.unwrap();

        let tracking = cache.tracking.read().await;
        assert!(tracking.get("store").is_none());
    }

    #[tokio::test]
    async fn test_delete_pattern_untracked_falls_back_to_scan() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        cache.set("user:123:profile", b"1", None).await.unwrap();
        cache.set("user:456:profile", b"2", None).await.unwrap();
        cache.set("user:123:settings", b"3", None).await.unwrap();

        cache.delete_pattern("user:123:*").await.unwrap();

        assert!(cache.get("user:123:profile").await.unwrap().is_none());
        assert!(cache.get("user:123:settings").await.unwrap().is_none());
        assert!(cache.get("user:456:profile").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_incr_starts_at_zero_and_survives_pattern_delete() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        let gen = generation_key(&store());

        assert_eq!(cache.incr(&gen).await.unwrap(), 1);
        assert_eq!(cache.incr(&gen).await.unwrap(), 2);

        cache.delete_pattern(&entity_pattern(&store())).await.unwrap();
        assert_eq!(cache.get(&gen).await.unwrap(), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn test_counters_are_not_evicted() {
        let cache = MemoryCache::new(1);
        let gen = generation_key(&store());
        cache.incr(&gen).await.unwrap();

        cache.set("a", b"1", None).await.unwrap();
        cache.set("b", b"2", None).await.unwrap();

        assert_eq!(cache.get(&gen).await.unwrap(), Some(b"1".to_vec()));
        assert!(cache.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_incr_continues_from_set_value() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        cache.set("counter", b"41", None).await.unwrap();
        assert_eq!(cache.incr("counter").await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_incr_rejects_non_numeric_value() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        cache.set("counter", b"abc", None).await.unwrap();
        assert!(cache.incr("counter").await.is_err());
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = MemoryCache::new(3);

        cache.set("key1", b"value1", None).await.unwrap();
        cache.set("key2", b"value2", None).await.unwrap();
        cache.set("key3", b"value3", None).await.unwrap();

        // key1 becomes most recently used
        cache.get("key1").await.unwrap();
        cache.set("key4", b"value4", None).await.unwrap();

        assert!(cache.get("key1").await.unwrap().is_some());
        assert!(cache.get("key2").await.unwrap().is_none());
        assert!(cache.get("key3").await.unwrap().is_some());
        assert!(cache.get("key4").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_zero_max_entries_holds_one() {
        let cache = MemoryCache::new(0);
        cache.set("a", b"1", None).await.unwrap();
        cache.set("b", b"2", None).await.unwrap();
        assert_eq!(cache.len().await, 1);
    }
}
