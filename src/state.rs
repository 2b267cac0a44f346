use std::{sync::Arc, time::Duration};

use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::middleware::RequestGate;
use crate::security::SecurityEventLog;
use crate::session::SessionStore;
use crate::store::CounterStore;

/// The shared application state.
///
/// Cloned into every handler. Everything mutable behind it is either atomic
/// or guarded by its own lock.
#[derive(Clone)]
pub struct AppState {
    /// The database connection pool.
    pub db: sqlx::SqlitePool,
    pub config: Arc<AppConfig>,
    pub metrics: Metrics,
    /// Sessions keyed by the session cookie; they hold the CSRF token.
    pub sessions: SessionStore,
    pub events: SecurityEventLog,
    /// The security pipeline, shared with the middleware layer.
    pub gate: Arc<RequestGate>,
}

impl AppState {
    pub fn new(
        db: sqlx::SqlitePool,
        config: AppConfig,
        store: Arc<dyn CounterStore>,
        events: SecurityEventLog,
    ) -> Self {
        let metrics = Metrics::new();
        let sessions = SessionStore::new(Duration::from_secs(config.security.session_ttl_secs));
        let gate = Arc::new(RequestGate::new(&config, store, sessions.clone(), events.clone(), metrics.clone()));

        Self { db, config: Arc::new(config), metrics, sessions, events, gate }
    }
}
