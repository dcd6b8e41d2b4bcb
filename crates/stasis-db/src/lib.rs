//! Replicated ledger store for Cyber Stasis peers.
//!
//! Peers persist every record under its id in a shared key/value database
//! so newcomers can bootstrap the full ledger. The [`LedgerStore`] trait
//! hides the backend; the rest of the workspace never names one directly.
//!
//! # Modules
//!
//! - [`store`] -- The [`LedgerStore`] trait and snapshot encoding
//! - [`dragonfly`] -- `Dragonfly` (Redis-compatible) backend
//! - [`memory`] -- In-process backend for tests and single-host setups
//! - [`error`] -- Shared error types

pub mod dragonfly;
pub mod error;
pub mod memory;
pub mod store;

// Re-export primary types for convenience.
pub use dragonfly::DragonflyStore;
pub use error::StoreError;
pub use memory::MemoryStore;
pub use store::{LedgerStore, SNAPSHOT_KEY, encode_snapshot};
