use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{CounterStore, StoreError, WindowHit};

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u64,
    expires_at: Instant,
}

/// In-process fixed-window counters.
///
/// Increment and expiry happen under one lock, so concurrent requests for one
/// key are counted exactly. Counters are not shared between processes.
#[derive(Clone, Default)]
pub struct MemoryCounterStore {
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops windows that have already ended.
    pub async fn cleanup_expired(&self) {
        let now = Instant::now();
        self.windows.lock().await.retain(|_, w| w.expires_at > now);
    }

    pub async fn len(&self) -> usize {
        self.windows.lock().await.len()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn hit(&self, key: &str, _max: u64, window: Duration) -> Result<WindowHit, StoreError> {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let entry = windows
            .entry(key.to_string())
            .and_modify(|w| {
                if w.expires_at <= now {
                    *w = Window { count: 0, expires_at: now + window };
                }
            })
            .or_insert(Window { count: 0, expires_at: now + window });
        entry.count += 1;
        Ok(WindowHit { count: entry.count, resets_in: entry.expires_at.saturating_duration_since(now) })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// A background task that periodically drops ended windows.
pub async fn cleanup_task(store: MemoryCounterStore) {
    let mut interval = tokio::time::interval(Duration::from_secs(300));
    loop {
        interval.tick().await;
        store.cleanup_expired().await;
    }
}
