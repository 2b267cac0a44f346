//! Rate-limit counter stores.
//!
//! A [`CounterStore`] is chosen once at startup from configuration and shared
//! by every request. The Redis and memory stores are atomic fixed-window
//! counters. The file store is the degraded fallback and keeps a timestamp log
//! per key; it is not atomic across concurrent callers (see [`file`]).

pub mod file;
pub mod memory;
pub mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{CounterBackend, RateLimitConfig};

pub use file::FileCounterStore;
pub use memory::MemoryCounterStore;
pub use self::redis::RedisCounterStore;

/// Result of recording one request against a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    /// Requests counted in the current window, including this one.
    pub count: u64,
    /// Time until the window ends.
    pub resets_in: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("counter store timed out after {0:?}")]
    Timeout(Duration),
    #[error("redis unavailable, next connection attempt in {0:?}")]
    Backoff(Duration),
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Records one request for `key` in a window of length `window`.
    ///
    /// `max` lets stores that log individual requests skip recording
    /// requests that are already over the limit.
    async fn hit(&self, key: &str, max: u64, window: Duration) -> Result<WindowHit, StoreError>;

    fn name(&self) -> &'static str;
}

/// Runs `hit` on a primary store and retries on the fallback when the
/// primary errors or exceeds `timeout`.
pub struct FailoverCounterStore {
    primary: Arc<dyn CounterStore>,
    fallback: Arc<dyn CounterStore>,
    timeout: Duration,
}

impl FailoverCounterStore {
    pub fn new(primary: Arc<dyn CounterStore>, fallback: Arc<dyn CounterStore>, timeout: Duration) -> Self {
        Self { primary, fallback, timeout }
    }
}

#[async_trait]
impl CounterStore for FailoverCounterStore {
    async fn hit(&self, key: &str, max: u64, window: Duration) -> Result<WindowHit, StoreError> {
        let err = match tokio::time::timeout(self.timeout, self.primary.hit(key, max, window)).await {
            Ok(Ok(hit)) => return Ok(hit),
            Ok(Err(e)) => e,
            Err(_) => StoreError::Timeout(self.timeout),
        };
        tracing::warn!(
            primary = self.primary.name(),
            fallback = self.fallback.name(),
            "Counter store failed, using fallback: {}",
            err
        );
        self.fallback.hit(key, max, window).await
    }

    fn name(&self) -> &'static str {
        "failover"
    }
}

/// Builds the configured store.
///
/// A Redis backend always sits behind the file store, so a Redis that is down
/// at startup is picked up once it becomes reachable.
pub async fn connect(cfg: &RateLimitConfig) -> Arc<dyn CounterStore> {
    match cfg.backend {
        CounterBackend::Memory => {
            let store = MemoryCounterStore::new();
            tokio::spawn(memory::cleanup_task(store.clone()));
            Arc::new(store)
        }
        CounterBackend::File => Arc::new(FileCounterStore::new(cfg.fallback_dir())),
        CounterBackend::Redis => {
            let file: Arc<dyn CounterStore> = Arc::new(FileCounterStore::new(cfg.fallback_dir()));
            let url = cfg.redis_url();
            let redis = match RedisCounterStore::new(&url) {
                Ok(redis) => redis,
                Err(e) => {
                    tracing::error!("Invalid redis url {}: {}; using file-backed rate limiting", url, e);
                    return file;
                }
            };
            match tokio::time::timeout(cfg.store_timeout() * 4, redis.connection()).await {
                Ok(Ok(_)) => tracing::info!("Rate limiting via redis at {}", url),
                Ok(Err(e)) => tracing::error!("Redis connection failed: {}; falling back to files until it recovers", e),
                Err(_) => tracing::error!("Redis connection to {} timed out; falling back to files until it recovers", url),
            }
            Arc::new(FailoverCounterStore::new(Arc::new(redis), file, cfg.store_timeout()))
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{BrokenStore, HangingStore, RecoveringStore};
    use super::*;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_failover_on_error() {
        let broken = Arc::new(BrokenStore::default());
        let store = FailoverCounterStore::new(
            broken.clone(),
            Arc::new(MemoryCounterStore::new()),
            Duration::from_millis(50),
        );
        let hit = store.hit("ip:1.2.3.4", 5, Duration::from_secs(60)).await.unwrap();
        assert_eq!(hit.count, 1);
        let hit = store.hit("ip:1.2.3.4", 5, Duration::from_secs(60)).await.unwrap();
        assert_eq!(hit.count, 2);
        assert_eq!(broken.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failover_on_timeout() {
        let store = FailoverCounterStore::new(
            Arc::new(HangingStore),
            Arc::new(MemoryCounterStore::new()),
            Duration::from_millis(50),
        );
        let hit = store.hit("ip:1.2.3.4", 5, Duration::from_secs(60)).await.unwrap();
        assert_eq!(hit.count, 1);
    }

    #[tokio::test]
    async fn test_failover_returns_to_recovered_primary() {
        let fallback = Arc::new(MemoryCounterStore::new());
        let store = FailoverCounterStore::new(
            Arc::new(RecoveringStore::new(2)),
            fallback.clone(),
            Duration::from_millis(50),
        );
        let window = Duration::from_secs(60);
        // Two outage hits land on the fallback.
        assert_eq!(store.hit("ip:1.2.3.4", 5, window).await.unwrap().count, 1);
        assert_eq!(store.hit("ip:1.2.3.4", 5, window).await.unwrap().count, 2);
        // The primary counts again from its own state once it answers.
        assert_eq!(store.hit("ip:1.2.3.4", 5, window).await.unwrap().count, 1);
        assert_eq!(store.hit("ip:1.2.3.4", 5, window).await.unwrap().count, 2);
        assert_eq!(fallback.hit("ip:1.2.3.4", 5, window).await.unwrap().count, 3);
    }

    #[tokio::test]
    async fn test_connect_memory_backend() {
        let mut cfg = crate::config::AppConfig::default().rate_limit;
        cfg.backend = CounterBackend::Memory;
        assert_eq!(connect(&cfg).await.name(), "memory");
    }

    #[tokio::test]
    async fn test_connect_unreachable_redis_keeps_failover() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = crate::config::AppConfig::default().rate_limit;
        cfg.backend = CounterBackend::Redis;
        cfg.redis_host = "127.0.0.1".into();
        // Port 1 is reserved and refuses connections on test hosts.
        cfg.redis_port = 1;
        cfg.fallback_dir = dir.path().display().to_string();
        let store = connect(&cfg).await;
        assert_eq!(store.name(), "failover");
        // Served by the file store while redis is down.
        assert_eq!(store.hit("ip:10.0.0.1", 5, Duration::from_secs(60)).await.unwrap().count, 1);
    }
}
