//! File-backed fallback counter store.
//!
//! Each key maps to `rate_limit_<sha256(key)>.json` holding a JSON array of
//! unix timestamps. Every hit reads the file, drops timestamps older than the
//! window, counts the survivors and appends the current time when the request
//! is admitted.
//!
//! Known race: the read-modify-write is not isolated. Two callers hitting the
//! same key at once can both read the same stale log and both be admitted, so
//! the limit can be exceeded under concurrency. No file lock is taken.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{CounterStore, StoreError, WindowHit};

#[derive(Debug, Clone)]
pub struct FileCounterStore {
    dir: PathBuf,
}

impl FileCounterStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        self.dir.join(format!("rate_limit_{}.json", hex))
    }

    async fn read_log(path: &Path) -> Result<Vec<i64>, StoreError> {
        match tokio::fs::read(path).await {
            // An unreadable or half-written log counts as empty.
            Ok(bytes) => Ok(serde_json::from_slice(&bytes).unwrap_or_default()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CounterStore for FileCounterStore {
    async fn hit(&self, key: &str, max: u64, window: Duration) -> Result<WindowHit, StoreError> {
        let path = self.path_for(key);
        let now = chrono::Utc::now().timestamp();
        let window_secs = window.as_secs() as i64;

        let mut log = Self::read_log(&path).await?;
        log.retain(|&t| now - t < window_secs);

        let survivors = log.len() as u64;
        if survivors < max {
            log.push(now);
            tokio::fs::create_dir_all(&self.dir).await?;
            tokio::fs::write(&path, serde_json::to_vec(&log)?).await?;
        }

        let oldest = log.iter().copied().min().unwrap_or(now);
        let resets_in = Duration::from_secs((window_secs - (now - oldest)).max(0) as u64);
        Ok(WindowHit { count: survivors + 1, resets_in })
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
