//! Observer API server for a Cyber Stasis peer.
//!
//! An Axum HTTP server that lets a dashboard (or `curl`) read the peer's
//! chart, rankings, notifications and pending requests, and submit demands
//! and supplies as the local citizen.
//!
//! # Architecture
//!
//! Handlers never hold ledger state. Reads are requests to the peer actor
//! and writes go through the same ingestor the rest of the peer uses, so
//! an HTTP submission is stored and broadcast exactly like any other.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

pub use error::ObserverError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
