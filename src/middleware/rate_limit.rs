//! Fixed-window rate limiting on top of a [`CounterStore`].

use std::{
    net::IpAddr,
    sync::Arc,
    time::Duration,
};

use crate::config::RateLimitConfig;
use crate::store::{CounterStore, StoreError};

/// A request budget: at most `max_requests` per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: u64,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub fn new(max_requests: u64, window_seconds: u64) -> Self {
        Self { max_requests, window: Duration::from_secs(window_seconds) }
    }
}

/// Headers attached to admitted requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u64,
    pub remaining: u64,
    /// Unix timestamp at which the window ends.
    pub reset_at: i64,
}

#[derive(Debug)]
pub enum RateLimitOutcome {
    Allowed(RateLimitStatus),
    /// Over the limit; `retry_after` is the policy window in seconds.
    Limited { retry_after: u64 },
    /// The store failed. The gate applies the configured fail-open policy.
    Unavailable(StoreError),
}

/// Who a request is counted against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    User(String),
    Ip(IpAddr),
}

impl Actor {
    pub fn identifier(&self) -> String {
        match self {
            Actor::User(id) => format!("user:{}", id),
            Actor::Ip(ip) => format!("ip:{}", ip),
        }
    }
}

/// Picks the policy by URI and counts requests per actor.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    default_policy: RateLimitPolicy,
    login_policy: RateLimitPolicy,
    timeout: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, cfg: &RateLimitConfig) -> Self {
        Self {
            store,
            default_policy: RateLimitPolicy::new(cfg.default_max_requests, cfg.default_window_secs),
            login_policy: RateLimitPolicy::new(cfg.login_max_requests, cfg.login_window_secs),
            timeout: cfg.store_timeout() * 2,
        }
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    /// Returns the counter key and policy for a request URI.
    ///
    /// URIs mentioning `/login` or `/auth` share the stricter login budget
    /// under a `:login` suffixed key.
    pub fn key_and_policy(&self, actor: &Actor, uri: &str) -> (String, RateLimitPolicy) {
        if uri.contains("/login") || uri.contains("/auth") {
            (format!("{}:login", actor.identifier()), self.login_policy)
        } else {
            (actor.identifier(), self.default_policy)
        }
    }

    pub async fn check(&self, actor: &Actor, uri: &str) -> RateLimitOutcome {
        let (key, policy) = self.key_and_policy(actor, uri);
        let hit = match tokio::time::timeout(self.timeout, self.store.hit(&key, policy.max_requests, policy.window))
            .await
        {
            Ok(Ok(hit)) => hit,
            Ok(Err(e)) => return RateLimitOutcome::Unavailable(e),
            Err(_) => return RateLimitOutcome::Unavailable(StoreError::Timeout(self.timeout)),
        };

        if hit.count > policy.max_requests {
            tracing::info!(key = %key, count = hit.count, "Rate limit exceeded");
            return RateLimitOutcome::Limited { retry_after: policy.window.as_secs() };
        }

        RateLimitOutcome::Allowed(RateLimitStatus {
            limit: policy.max_requests,
            remaining: policy.max_requests.saturating_sub(hit.count),
            reset_at: chrono::Utc::now().timestamp() + hit.resets_in.as_secs() as i64,
        })
    }
}
