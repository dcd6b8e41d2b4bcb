//! Peer entry point for Cyber Stasis.
//!
//! Each citizen runs one peer. The peer keeps a full replica of the shared
//! supply/demand ledger, exchanges records with other peers over NATS,
//! persists them to `Dragonfly` so newcomers can bootstrap, and serves the
//! observer JSON API for the local dashboard.
//!
//! # Architecture
//!
//! ```text
//! Dragonfly (ledger) <-- RecordIngestor --> NATS (demand / critical)
//!                              |
//!                        peer actor <-- Observer API (HTTP)
//! ```
//!
//! Neither backend has to be up at startup: the store client and the NATS
//! client both reconnect in the background and the peer runs degraded
//! until they do.

mod error;
mod nats;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use stasis_core::config::{ConfigError, LogFormat, LoggingConfig};
use stasis_core::{PeerRuntime, StasisConfig};
use stasis_db::DragonflyStore;
use stasis_observer::{AppState, ServerConfig, start_server};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::PeerError;
use crate::nats::NatsChannel;

/// Config file read when no path is given on the command line.
const DEFAULT_CONFIG_PATH: &str = "stasis-config.yaml";

/// How long a store command may wait for `Dragonfly` before failing.
const STORE_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Application entry point.
///
/// Loads configuration, initializes logging, starts the peer and serves
/// the observer API until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the peer cannot
/// start serving.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let (config, from_file) = load_config(&path)?;

    init_tracing(&config.logging);
    if from_file {
        info!(path = %path.display(), "configuration loaded");
    } else {
        info!(path = %path.display(), "no config file, using defaults");
    }

    run(config).await?;
    Ok(())
}

/// Read `path`, or fall back to defaults (plus environment overrides) when
/// it does not exist.
fn load_config(path: &Path) -> Result<(StasisConfig, bool), ConfigError> {
    if path.exists() {
        return Ok((StasisConfig::from_file(path)?, true));
    }
    let mut config = StasisConfig::default();
    config.apply_env_overrides();
    Ok((config, false))
}

/// Initialize structured logging. `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_unset| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_invalid| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn run(config: StasisConfig) -> Result<(), PeerError> {
    let peer_id = config.peer.resolve_id();
    info!(
        peer_id = %peer_id,
        nats_url = config.infrastructure.nats_url,
        dragonfly_url = config.infrastructure.dragonfly_url,
        db_address = config.ledger.db_address,
        demand_topic = config.channel.demand_topic,
        "stasis-peer starting"
    );
    warn!(
        "citizen ids are a keyed hash of the peer id; they hide the peer id \
         but do not authenticate anyone"
    );

    let store = DragonflyStore::connect_in_background(
        &config.infrastructure.dragonfly_url,
        STORE_COMMAND_TIMEOUT,
    )?;
    let channel = NatsChannel::connect(&config.infrastructure.nats_url, peer_id).await?;

    let runtime = PeerRuntime::start(&config, Arc::new(store), Arc::new(channel)).await?;
    info!(
        citizen = %runtime.citizen(),
        bootstrap = ?runtime.bootstrap_outcome(),
        "peer running"
    );

    let state = Arc::new(AppState::new(Arc::clone(runtime.ingestor())));
    let server_config = ServerConfig {
        port: config.infrastructure.observer_port,
        ..ServerConfig::default()
    };
    let served = start_server(&server_config, state, shutdown_signal()).await;

    runtime.shutdown().await;
    served?;
    info!("stasis-peer stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => warn!(error = %e, "cannot listen for Ctrl-C, shutting down"),
    }
}
