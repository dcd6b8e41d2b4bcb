//! Error types for the peer binary.
//!
//! Everything that can stop the process before it starts serving ends up
//! here. Once running, outages degrade instead of failing.

use stasis_core::config::ConfigError;
use stasis_core::{ChannelError, StartError};
use stasis_db::StoreError;
use stasis_observer::ServerError;

/// Errors that can occur while starting or running a peer.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// The configuration file could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The ledger store client could not be created.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The broadcast channel could not be created.
    #[error("NATS error: {0}")]
    Channel(#[from] ChannelError),

    /// The peer engine refused to start.
    #[error("startup error: {0}")]
    Start(#[from] StartError),

    /// The observer API failed.
    #[error("observer error: {0}")]
    Server(#[from] ServerError),
}
