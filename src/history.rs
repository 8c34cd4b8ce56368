//! ==============================================================================
//! history.rs - bounded reading history
//! ==============================================================================
//!
//! purpose:
//!     every ingestion appends a full snapshot of the merged reading to an
//!     append-only log, then trims the log to the most recent N entries.
//!     "most recent" means insertion order, never timestamp value.
//!
//! relationships:
//!     - implemented by: MemoryHistory (below), firebase.rs (FirebaseHistory)
//!     - used by: ingest.rs (Ingestor calls RetentionPolicy::record)
//!
//! ==============================================================================

use crate::domain::SensorReading;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// number of snapshots kept when nothing else is configured
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// failures talking to the history log
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// network, dns, tls or timeout failure reaching the store
    #[error("history store unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),

    /// the store answered with a non-success status
    #[error("history store rejected request: status={status}, body={body}")]
    Rejected { status: u16, body: String },

    /// the store answered with something we could not read
    #[error("history store returned an unreadable response: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// an append-only log of reading snapshots keyed by store-generated ids
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// append a snapshot and return its key
    async fn append(&self, reading: &SensorReading) -> Result<String>;

    /// every key currently held, oldest insertion first
    async fn keys(&self) -> Result<Vec<String>>;

    async fn remove(&self, key: &str) -> Result<()>;
}

/// keeps the log at most `limit` entries long
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    limit: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl RetentionPolicy {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// append `reading`, then evict the oldest entries beyond the limit
    ///
    /// returns the keys that were evicted.
    pub async fn record(
        &self,
        store: &dyn HistoryStore,
        reading: &SensorReading,
    ) -> Result<Vec<String>> {
        let key = store.append(reading).await?;
        tracing::debug!(key = %key, "appended reading snapshot");

        let keys = store.keys().await?;
        if keys.len() <= self.limit {
            return Ok(Vec::new());
        }

        let excess = keys.len() - self.limit;
        let evicted: Vec<String> = keys.into_iter().take(excess).collect();
        for old in &evicted {
            store.remove(old).await?;
        }
        tracing::debug!(evicted = evicted.len(), limit = self.limit, "trimmed reading history");
        Ok(evicted)
    }
}

/// in-process history log
///
/// keys are zero-padded sequence numbers so lexical order is insertion order,
/// the same property realtime database push ids have.
#[derive(Default)]
pub struct MemoryHistory {
    inner: Mutex<MemoryLog>,
}

#[derive(Default)]
struct MemoryLog {
    next: u64,
    entries: BTreeMap<String, SensorReading>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// every snapshot currently held, oldest insertion first
    pub fn entries(&self) -> Vec<(String, SensorReading)> {
        self.log()
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn log(&self) -> std::sync::MutexGuard<'_, MemoryLog> {
        // a poisoned log still holds valid snapshots
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn append(&self, reading: &SensorReading) -> Result<String> {
        let mut log = self.log();
        let key = format!("{:020}", log.next);
        log.next += 1;
        log.entries.insert(key.clone(), reading.clone());
        Ok(key)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.log().entries.keys().cloned().collect())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.log().entries.remove(key);
        Ok(())
    }
}
