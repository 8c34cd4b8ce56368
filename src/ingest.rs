//! ==============================================================================
//! ingest.rs - latest reading store and ingestion pipeline
//! ==============================================================================
//!
//! purpose:
//!     owns the in-memory "latest reading" and runs each device update
//!     through merge -> publish -> append -> trim.
//!
//! consistency:
//!     - the whole sequence runs under one ingestion lock, so two concurrent
//!       updates can never read the same prior state (no lost updates) and
//!       two trims can never interleave.
//!     - the merged reading is published to memory BEFORE the history call.
//!       a store failure is reported to the device but the dashboard still
//!       shows the newest values.
//!     - readers take a short read lock on the reading only; they never wait
//!       on the history store.
//!
//! relationships:
//!     - uses: domain.rs (merge), history.rs (RetentionPolicy, HistoryStore)
//!     - used by: app.rs (POST /update_data, GET /get_data)
//!
//! ==============================================================================

use crate::domain::{self, SensorReading, SensorUpdate};
use crate::history::{HistoryStore, RetentionPolicy, StoreError};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// the single mutable reading, created empty at startup
#[derive(Clone, Default)]
pub struct LatestReading {
    inner: Arc<RwLock<SensorReading>>,
}

impl LatestReading {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> SensorReading {
        self.inner.read().await.clone()
    }

    async fn set(&self, reading: SensorReading) {
        *self.inner.write().await = reading;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// merged and published in memory, but the history log write failed
    #[error("reading merged but not stored: {source}")]
    StoreUnavailable {
        reading: SensorReading,
        #[source]
        source: StoreError,
    },
}

/// source of reading timestamps
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

#[derive(Clone)]
pub struct Ingestor {
    latest: LatestReading,
    history: Arc<dyn HistoryStore>,
    policy: RetentionPolicy,
    clock: Clock,
    gate: Arc<Mutex<()>>,
    show_sensor_data: bool,
}

impl Ingestor {
    pub fn new(
        latest: LatestReading,
        history: Arc<dyn HistoryStore>,
        policy: RetentionPolicy,
    ) -> Self {
        Self {
            latest,
            history,
            policy,
            clock: Arc::new(domain::now_timestamp),
            gate: Arc::new(Mutex::new(())),
            show_sensor_data: false,
        }
    }

    /// replace the wall clock (tests pin timestamps with this)
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// log every merged reading at info level
    pub fn with_sensor_logging(mut self, enabled: bool) -> Self {
        self.show_sensor_data = enabled;
        self
    }

    /// current in-memory reading, never touches the history store
    pub async fn snapshot(&self) -> SensorReading {
        self.latest.get().await
    }

    /// merge one device update and record it in history
    pub async fn ingest(&self, update: SensorUpdate) -> Result<SensorReading, IngestError> {
        let _guard = self.gate.lock().await;

        let current = self.latest.get().await;
        let merged = current.merge(&update, (self.clock)());
        self.latest.set(merged.clone()).await;

        if self.show_sensor_data {
            tracing::info!(
                temperature = ?merged.temperature,
                soil_moisture = ?merged.soil_moisture,
                ph = ?merged.ph,
                nitrogen = ?merged.nitrogen,
                phosphorus = ?merged.phosphorus,
                potassium = ?merged.potassium,
                "reading updated"
            );
        }

        match self.policy.record(self.history.as_ref(), &merged).await {
            Ok(evicted) => {
                if !evicted.is_empty() {
                    tracing::debug!(count = evicted.len(), "evicted old snapshots");
                }
                Ok(merged)
            }
            Err(source) => {
                tracing::error!(error = %source, "failed to record reading history");
                Err(IngestError::StoreUnavailable {
                    reading: merged,
                    source,
                })
            }
        }
    }
}
