//! Peer engine for Cyber Stasis.
//!
//! Wires the local ledger replica to the shared store and the broadcast
//! channel, owns all mutable peer state in a single actor, and raises the
//! notifications a citizen sees.
//!
//! # Architecture
//!
//! ```text
//! LedgerStore --bootstrap--> RecordIngestor <--receive loop-- BroadcastChannel
//!                                  |
//!                            PeerHandle (mpsc)
//!                                  |
//!                   actor: Ledger, rankings, NotificationCenter
//! ```
//!
//! - [`actor`] -- [`PeerState`] and the task that serializes every mutation.
//! - [`ingest`] -- [`RecordIngestor`]: bootstrap, submissions, inbound records.
//! - [`receiver`] -- The receive loop and its resubscribing supervisor.
//! - [`runtime`] -- [`PeerRuntime`]: startup order and shutdown.
//! - [`channel`] -- The [`BroadcastChannel`] seam and an in-process hub.
//! - [`codec`] -- Record and snapshot wire encoding.
//! - [`identity`] -- Citizen ids derived from peer ids.
//! - [`notify`] -- Notification content and the [`NotificationCenter`].
//! - [`retry`] -- Exponential backoff.
//! - [`config`] -- YAML configuration with environment overrides.
//! - [`error`] -- Error types.
//!
//! Nothing in this crate stops the process: store and channel outages
//! degrade, bad messages are dropped, and undelivered submissions stay in
//! the local ledger.

pub mod actor;
pub mod channel;
pub mod codec;
pub mod config;
pub mod error;
pub mod identity;
pub mod ingest;
pub mod notify;
pub mod receiver;
pub mod retry;
pub mod runtime;

pub use actor::{Applied, PeerHandle, PeerState, PeerStatus};
pub use channel::{BroadcastChannel, Envelope, LoopbackChannel, LoopbackHub, Subscription};
pub use config::StasisConfig;
pub use error::{
    ActorError, ChannelError, DecodeError, DeliveryError, IngestError, QueryError, StartError,
    SubmitError,
};
pub use ingest::{BootstrapOutcome, IngestSettings, RecordIngestor, Submission};
pub use notify::{Message, NotificationCenter};
pub use runtime::PeerRuntime;
pub use stasis_ledger::{LedgerError, Upsert};
