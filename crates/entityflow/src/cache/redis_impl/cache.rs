//! Redis cache implementation.
//!
//! Query keys are tracked in one Redis Set per entity type so invalidation
//! never needs SCAN. Tracking is not atomic with the writes it follows:
//! - a tracked key that was never written is deleted as a no-op
//! - a written key whose SADD failed is only reachable until its TTL expires
//!   and, being under an old generation, is never read after invalidation

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use entityflow_core::cache::{
    extract_entity_from_key, extract_entity_from_pattern, pattern_matches, tracking_key, Cache,
    Result,
};
use entityflow_core::record::EntityType;

use super::error::map_redis_error;

/// Redis cache backend using a connection manager for reconnects.
pub struct RedisCache {
    conn: redis::aio::ConnectionManager,
}

impl RedisCache {
    /// Connects to Redis, e.g. `redis://localhost:6379`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::ConnectionFailed` if the connection cannot be established.
    pub async fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(map_redis_error)?;
        Ok(Self { conn })
    }
}

fn entity_tracking_key(entity: &str) -> String {
    tracking_key(&EntityType::new(entity))
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let result: Option<Vec<u8>> = conn.get(key).await.map_err(map_redis_error)?;
        Ok(result)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();

        match ttl {
            Some(duration) => {
                let seconds = duration.as_secs().max(1);
                conn.set_ex::<_, _, ()>(key, value, seconds)
                    .await
                    .map_err(map_redis_error)?;
            }
            None => {
                conn.set::<_, _, ()>(key, value)
                    .await
                    .map_err(map_redis_error)?;
            }
        }

        if let Some(entity) = extract_entity_from_key(key) {
            conn.sadd::<_, _, ()>(entity_tracking_key(entity), key)
                .await
                .map_err(map_redis_error)?;
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();

        if let Some(entity) = extract_entity_from_key(key) {
            conn.srem::<_, _, ()>(entity_tracking_key(entity), key)
                .await
                .map_err(map_redis_error)?;
        }

        conn.del::<_, ()>(key).await.map_err(map_redis_error)?;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        let Some(entity) = extract_entity_from_pattern(pattern) else {
            // Only query keys are tracked.
            return Ok(());
        };

        let mut conn = self.conn.clone();
        let tracking = entity_tracking_key(entity);

        let tracked: Vec<String> = conn.smembers(&tracking).await.map_err(map_redis_error)?;
        let doomed: Vec<&String> = tracked
            .iter()
            .filter(|k| pattern_matches(pattern, k))
            .collect();

        if !doomed.is_empty() {
            conn.del::<_, ()>(&doomed).await.map_err(map_redis_error)?;
            conn.srem::<_, _, ()>(&tracking, &doomed)
                .await
                .map_err(map_redis_error)?;
        }

        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let value: u64 = conn.incr(key, 1u64).await.map_err(map_redis_error)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entityflow_core::cache::{entity_pattern, generation_key, query_key, QueryKind};
    use uuid::Uuid;

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
    }

    /// Skip test if Redis not available.
    async fn get_test_cache() -> Option<RedisCache> {
        RedisCache::new(&redis_url()).await.ok()
    }

    /// Unique entity type so parallel runs never collide.
    fn test_entity() -> EntityType {
        EntityType::new(format!("test{}", Uuid::new_v4().simple()))
    }

    #[tokio::test]
    async fn test_redis_set_get_delete() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let key = query_key(&test_entity(), 0, QueryKind::Get, "fp");
        cache.set(&key, b"hello", None).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(b"hello".to_vec()));

        cache.delete(&key).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_redis_ttl() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let key = query_key(&test_entity(), 0, QueryKind::Get, "ttl");
        cache
            .set(&key, b"expiring", Some(Duration::from_secs(1)))
            .await
            .unwrap();
        assert!(cache.get(&key).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_redis_delete_pattern_by_entity() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let entity = test_entity();
        let other = test_entity();
        let key1 = query_key(&entity, 0, QueryKind::Get, "a");
        let key2 = query_key(&entity, 1, QueryKind::List, "b");
        let key3 = query_key(&other, 0, QueryKind::Get, "a");

        cache.set(&key1, b"1", None).await.unwrap();
        cache.set(&key2, b"2", None).await.unwrap();
        cache.set(&key3, b"3", None).await.unwrap();

        cache.delete_pattern(&entity_pattern(&entity)).await.unwrap();

        assert!(cache.get(&key1).await.unwrap().is_none());
        assert!(cache.get(&key2).await.unwrap().is_none());
        assert!(cache.get(&key3).await.unwrap().is_some());

        let mut conn = cache.conn.clone();
        let tracked: Vec<String> = conn.smembers(tracking_key(&entity)).await.unwrap();
        assert!(tracked.is_empty());

        cache.delete(&key3).await.unwrap();
    }

    #[tokio::test]
    async fn test_redis_incr() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let key = generation_key(&test_entity());
        assert_eq!(cache.incr(&key).await.unwrap(), 1);
        assert_eq!(cache.incr(&key).await.unwrap(), 2);
        assert_eq!(cache.get(&key).await.unwrap(), Some(b"2".to_vec()));

        cache.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_redis_delete_pattern_untracked_is_noop() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let key = format!("test:redis_cache:{}", Uuid::new_v4());
        cache.set(&key, b"value", None).await.unwrap();
        cache.delete_pattern("test:*").await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_some());

        cache.delete(&key).await.unwrap();
    }
}
