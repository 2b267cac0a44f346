use std::time::Duration;

use ::redis::{
    aio::{ConnectionManager, ConnectionManagerConfig},
    AsyncCommands, Client,
};
use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use super::{CounterStore, StoreError, WindowHit};

/// Minimum spacing between connection attempts while Redis is down.
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Fixed-window counters in Redis: `INCR`, `EXPIRE` on the first increment, `TTL`.
///
/// `INCR` is atomic on the server, so concurrent gateways share one exact count.
/// The connection is opened on first use and re-attempted at most once per
/// [`RECONNECT_BACKOFF`] until it succeeds; once open, [`ConnectionManager`]
/// reconnects on its own.
pub struct RedisCounterStore {
    client: Client,
    conn: RwLock<Option<ConnectionManager>>,
    schedule: Mutex<ReconnectSchedule>,
}

impl RedisCounterStore {
    /// Parses `url` without connecting.
    pub fn new(url: &str) -> Result<Self, StoreError> {
        Ok(Self {
            client: Client::open(url)?,
            conn: RwLock::new(None),
            schedule: Mutex::new(ReconnectSchedule::new(RECONNECT_BACKOFF)),
        })
    }

    /// Returns the open connection, or tries to open one if the backoff allows it.
    pub async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        if let Some(conn) = self.conn.read().await.as_ref() {
            return Ok(conn.clone());
        }

        self.schedule.lock().await.claim(Instant::now()).map_err(StoreError::Backoff)?;

        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(CONNECT_TIMEOUT);
        let conn = ConnectionManager::new_with_config(self.client.clone(), config).await?;
        *self.conn.write().await = Some(conn.clone());

        self.schedule.lock().await.reset();
        tracing::info!("Connected to redis");
        Ok(conn)
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn hit(&self, key: &str, _max: u64, window: Duration) -> Result<WindowHit, StoreError> {
        let mut conn = self.connection().await?;
        let window_secs = window.as_secs() as i64;

        let count: u64 = conn.incr(key, 1u64).await?;
        if needs_expiry(count) {
            let _: () = conn.expire(key, window_secs).await?;
        }

        let ttl: i64 = conn.ttl(key).await?;
        let window = remaining_window(ttl, window_secs);
        if window.reexpire {
            let _: () = conn.expire(key, window_secs).await?;
        }

        Ok(WindowHit { count, resets_in: window.resets_in })
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// The first increment of a key opens its window.
fn needs_expiry(count: u64) -> bool {
    count == 1
}

#[derive(Debug, PartialEq, Eq)]
struct RemainingWindow {
    resets_in: Duration,
    /// The key has no expiry (a crash between `INCR` and `EXPIRE`) and must get one.
    reexpire: bool,
}

/// Interprets a `TTL` reply: `-1` is a key without expiry, `-2` a key that
/// vanished since the increment.
fn remaining_window(ttl: i64, window_secs: i64) -> RemainingWindow {
    if ttl == -1 {
        return RemainingWindow { resets_in: Duration::from_secs(window_secs.max(0) as u64), reexpire: true };
    }
    RemainingWindow { resets_in: Duration::from_secs(ttl.max(0) as u64), reexpire: false }
}

/// Spacing of connection attempts. A caller claims an attempt before
/// connecting, so concurrent requests during an outage share one attempt.
#[derive(Debug)]
struct ReconnectSchedule {
    backoff: Duration,
    next_attempt: Option<Instant>,
}

impl ReconnectSchedule {
    fn new(backoff: Duration) -> Self {
        Self { backoff, next_attempt: None }
    }

    /// Claims the next attempt, or returns how long until one is allowed.
    fn claim(&mut self, now: Instant) -> Result<(), Duration> {
        if let Some(at) = self.next_attempt {
            if now < at {
                return Err(at - now);
            }
        }
        self.next_attempt = Some(now + self.backoff);
        Ok(())
    }

    fn reset(&mut self) {
        self.next_attempt = None;
    }
}
