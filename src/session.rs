//! Cookie-identified sessions holding the CSRF token.

use std::{collections::HashMap, sync::Arc, time::Duration};

use rand::RngCore;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Session {
    csrf_token: String,
    last_seen: Instant,
}

/// In-process session store with an idle timeout.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self { sessions: Arc::new(RwLock::new(HashMap::new())), ttl }
    }

    /// Returns `(session_id, csrf_token)`, reusing a live session when `session_id` names one.
    ///
    /// A session's token is generated once and kept for its lifetime.
    pub async fn issue_csrf_token(&self, session_id: Option<&str>) -> (String, String) {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        if let Some(id) = session_id {
            if let Some(session) = sessions.get_mut(id) {
                if now.duration_since(session.last_seen) < self.ttl {
                    session.last_seen = now;
                    return (id.to_string(), session.csrf_token.clone());
                }
            }
        }

        let id = uuid::Uuid::new_v4().simple().to_string();
        let token = random_token();
        sessions.insert(id.clone(), Session { csrf_token: token.clone(), last_seen: now });
        (id, token)
    }

    /// The token pinned to a live session.
    pub async fn csrf_token(&self, session_id: &str) -> Option<String> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(session_id)?;
        if now.duration_since(session.last_seen) >= self.ttl {
            sessions.remove(session_id);
            return None;
        }
        session.last_seen = now;
        Some(session.csrf_token.clone())
    }

    pub async fn cleanup_expired(&self) {
        let now = Instant::now();
        let ttl = self.ttl;
        self.sessions.write().await.retain(|_, s| now.duration_since(s.last_seen) < ttl);
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
