//! Append-only security event log.
//!
//! Events are emitted as `tracing` records on target `security` and, when a
//! log file is configured, handed to a background writer through a bounded
//! channel. Recording never waits: a full channel drops the file copy.

use std::net::IpAddr;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::middleware::validation::sanitize_for_logging;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize)]
pub struct SecurityEvent {
    pub timestamp: String,
    pub event: String,
    pub ip: String,
    pub user_agent: String,
    pub details: Map<String, Value>,
}

impl SecurityEvent {
    pub fn new(event: &str, ip: Option<IpAddr>, user_agent: Option<&str>) -> Self {
        Self {
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            event: event.to_string(),
            ip: ip.map(|ip| ip.to_string()).unwrap_or_else(|| "unknown".to_string()),
            user_agent: user_agent.map(sanitize_for_logging).unwrap_or_else(|| "unknown".to_string()),
            details: Map::new(),
        }
    }

    pub fn detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Clone)]
pub struct SecurityEventLog {
    sender: Option<mpsc::Sender<SecurityEvent>>,
}

impl SecurityEventLog {
    /// Logs to `tracing` only.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Spawns the file writer. Must be called inside a Tokio runtime.
    pub fn spawn(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(write_events(path, rx));
        Self { sender: Some(tx) }
    }

    pub fn record(&self, event: SecurityEvent) {
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Failed to serialize security event: {}", e);
                return;
            }
        };
        tracing::warn!(target: "security", event = %event.event, "SECURITY: {}", line);

        if let Some(tx) = &self.sender {
            if let Err(e) = tx.try_send(event) {
                tracing::debug!("Security event not written to file: {}", e);
            }
        }
    }
}

async fn write_events(path: PathBuf, mut rx: mpsc::Receiver<SecurityEvent>) {
    if let Some(parent) = path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            tracing::warn!("Security log directory {} unavailable: {}", parent.display(), e);
        }
    }
    while let Some(event) = rx.recv().await {
        let Ok(mut line) = serde_json::to_string(&event) else {
            continue;
        };
        line.push('\n');
        let file = tokio::fs::OpenOptions::new().create(true).append(true).open(&path).await;
        match file {
            Ok(mut f) => {
                if let Err(e) = f.write_all(line.as_bytes()).await {
                    tracing::warn!("Failed to append security event: {}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to open security log {}: {}", path.display(), e),
        }
    }
}
