use std::{env, str::FromStr, time::Duration};

use crate::tasks::{PostCommitMode, RetryPolicy};

/// Pipeline configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache TTL in seconds (default: 300)
    pub cache_ttl_seconds: u64,
    /// Maximum number of cache entries (default: 10,000)
    pub cache_max_entries: usize,
    /// Bounded task queue capacity (default: 1,024)
    pub task_queue_capacity: usize,
    /// Concurrent background workers (default: 4)
    pub task_workers: usize,
    /// Attempts per post-commit task, including the first (default: 3)
    pub task_max_attempts: u32,
    /// First retry delay in milliseconds (default: 100)
    pub task_retry_base_ms: u64,
    /// Retry delay cap in milliseconds (default: 5,000)
    pub task_retry_max_ms: u64,
    /// Timeout for each record store call in milliseconds (default: 5,000)
    pub store_timeout_ms: u64,
    /// Timeout for each post-commit attempt in milliseconds (default: 5,000)
    pub step_timeout_ms: u64,
    /// Where post-commit work runs (default: background)
    pub post_commit_mode: PostCommitMode,
    /// Path to SQLite database file (default: "entityflow.db")
    pub sqlite_path: String,
    /// Redis connection URL (default: "redis://localhost:6379")
    /// Note: Only used when the `redis` feature is enabled.
    #[allow(dead_code)]
    pub redis_url: String,
    /// Service name used in event topics (default: "entityflow")
    pub service_label: String,
}

fn parsed<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CACHE_TTL_SECONDS` - Cache TTL in seconds (default: 300)
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 10,000)
    /// - `TASK_QUEUE_CAPACITY` - Task queue capacity (default: 1,024)
    /// - `TASK_WORKERS` - Concurrent task workers (default: 4)
    /// - `TASK_MAX_ATTEMPTS` - Attempts per task (default: 3)
    /// - `TASK_RETRY_BASE_MS` - First retry delay (default: 100)
    /// - `TASK_RETRY_MAX_MS` - Retry delay cap (default: 5,000)
    /// - `STORE_TIMEOUT_MS` - Store call timeout (default: 5,000)
    /// - `STEP_TIMEOUT_MS` - Post-commit attempt timeout (default: 5,000)
    /// - `POST_COMMIT_MODE` - `background` or `inline` (default: background)
    /// - `SQLITE_PATH` - SQLite database path (default: "entityflow.db")
    /// - `REDIS_URL` - Redis connection URL (default: "redis://localhost:6379")
    /// - `SERVICE_LABEL` - Event topic prefix (default: "entityflow")
    pub fn from_env() -> Self {
        Self {
            cache_ttl_seconds: parsed("CACHE_TTL_SECONDS", 300),
            cache_max_entries: parsed("CACHE_MAX_ENTRIES", 10_000),
            task_queue_capacity: parsed("TASK_QUEUE_CAPACITY", 1_024),
            task_workers: parsed("TASK_WORKERS", 4),
            task_max_attempts: parsed("TASK_MAX_ATTEMPTS", 3),
            task_retry_base_ms: parsed("TASK_RETRY_BASE_MS", 100),
            task_retry_max_ms: parsed("TASK_RETRY_MAX_MS", 5_000),
            store_timeout_ms: parsed("STORE_TIMEOUT_MS", 5_000),
            step_timeout_ms: parsed("STEP_TIMEOUT_MS", 5_000),
            post_commit_mode: parsed("POST_COMMIT_MODE", PostCommitMode::Background),
            sqlite_path: env::var("SQLITE_PATH").unwrap_or_else(|_| "entityflow.db".to_string()),
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            service_label: env::var("SERVICE_LABEL").unwrap_or_else(|_| "entityflow".to_string()),
        }
    }

    /// Get cache TTL as a Duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Retry schedule for post-commit tasks.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.task_max_attempts,
            base_delay: Duration::from_millis(self.task_retry_base_ms),
            max_delay: Duration::from_millis(self.task_retry_max_ms),
            attempt_timeout: Duration::from_millis(self.step_timeout_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: 300,
            cache_max_entries: 10_000,
            task_queue_capacity: 1_024,
            task_workers: 4,
            task_max_attempts: 3,
            task_retry_base_ms: 100,
            task_retry_max_ms: 5_000,
            store_timeout_ms: 5_000,
            step_timeout_ms: 5_000,
            post_commit_mode: PostCommitMode::Background,
            sqlite_path: "entityflow.db".to_string(),
            redis_url: "redis://localhost:6379".to_string(),
            service_label: "entityflow".to_string(),
        }
    }
}
