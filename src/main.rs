//! ==============================================================================
//! main.rs - soil hub entry point
//! ==============================================================================
//!
//! purpose:
//!     the backend a field sensor posts to and an operator watches.
//!
//! responsibilities:
//!     - load configuration (file + environment), refuse to start without
//!       store credentials or an operator login
//!     - build the history store (firebase realtime database, or in-memory)
//!     - wire the ingestor and session gate into the http app
//!     - serve until ctrl-c
//!
//! architecture:
//!
//!     ┌────────────┐  POST /update_data   ┌──────────────────────────────┐
//!     │ esp32 node │ ───────────────────▶ │ ingestor                     │
//!     └────────────┘                      │  merge -> latest reading     │
//!                                         │  append + trim -> history ───┼──▶ firebase
//!     ┌────────────┐  GET / , /get_data   │                              │
//!     │  browser   │ ◀──────────────────▶ │ session gate -> latest       │
//!     └────────────┘                      └──────────────────────────────┘
//!
//! usage:
//!     soil-hub [config.toml]
//!
//! ==============================================================================

use anyhow::{Context, Result};
use soil_hub::app::{self, AppState};
use soil_hub::config::{HubConfig, StoreBackend};
use soil_hub::firebase::FirebaseHistory;
use soil_hub::history::{HistoryStore, MemoryHistory, RetentionPolicy};
use soil_hub::ingest::{Ingestor, LatestReading};
use soil_hub::logging;
use soil_hub::session::SessionManager;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: load configuration
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let (config, source) =
        HubConfig::load_for_startup(config_path).context("invalid configuration")?;

    logging::init(&config.logging.level);
    match &source {
        Some(path) => tracing::info!(path = %path.display(), "loaded config"),
        None => tracing::warn!("no config file found, using defaults and environment"),
    }
    config.log_summary();

    // step 2: history store
    let history: Arc<dyn HistoryStore> = match config.store.backend {
        StoreBackend::Firebase => Arc::new(
            FirebaseHistory::new(&config.store.firebase)
                .context("failed to create firebase client")?,
        ),
        StoreBackend::Memory => {
            tracing::warn!("using in-memory history, snapshots are lost on restart");
            Arc::new(MemoryHistory::new())
        }
    };

    // step 3: shared state
    let ingestor = Ingestor::new(
        LatestReading::new(),
        history,
        RetentionPolicy::new(config.store.history_limit),
    )
    .with_sensor_logging(config.logging.show_sensor_data);
    let sessions = Arc::new(SessionManager::new(
        config.auth.username.clone(),
        config.auth.password.clone(),
        Duration::from_secs(config.auth.session_ttl_secs),
    ));

    // step 4: serve
    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "soil hub listening");

    let app = app::build_app(AppState { ingestor, sessions });
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("soil hub stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
