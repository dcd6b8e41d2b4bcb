//! Error taxonomy for the peer engine.
//!
//! | Error | Raised by | Effect |
//! |-------|-----------|--------|
//! | [`StoreError::Unavailable`] | ledger store | bootstrap degrades to an empty ledger |
//! | [`ChannelError::Unavailable`] | broadcast channel | delivery retried, then reported |
//! | [`DecodeError`] | codec | the offending message or entry is dropped |
//! | [`StoreError::NotFound`] | ledger store | empty ledger, not an error |
//! | [`IngestError::Rejected`] | ledger | the remote record is dropped |
//!
//! None of these stop the peer.

use stasis_chart::ChartError;
use stasis_db::StoreError;
use stasis_ledger::LedgerError;
use stasis_types::{Record, RecordError};

/// A payload could not be turned into a valid record.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The payload is not the expected JSON.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A snapshot entry is not valid base64.
    #[error("malformed base64 in snapshot entry {key}: {message}")]
    Base64 {
        /// The snapshot key of the entry.
        key: String,
        /// Decoder message.
        message: String,
    },

    /// The record decoded but breaks an invariant.
    #[error("invalid record: {0}")]
    Invalid(#[from] RecordError),
}

/// The broadcast channel failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// The transport could not be reached or rejected the operation.
    #[error("channel unavailable: {0}")]
    Unavailable(String),
}

/// The mutation actor has shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("peer actor is no longer running")]
pub struct ActorError;

/// Writing or broadcasting a record failed after all retries.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The ledger store rejected or could not take the write.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The record could not be broadcast.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// A local submission failed.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The ledger refused the submission (unknown id, already fulfilled).
    #[error("submission rejected: {0}")]
    Rejected(#[from] LedgerError),

    /// The record was applied locally but could not be shared.
    ///
    /// The local ledger keeps the record; other peers will not see it until
    /// it is re-sent.
    #[error("record {} applied locally but not delivered: {source}", .record.id)]
    NotDelivered {
        /// The record as applied to the local ledger.
        record: Box<Record>,
        /// Why delivery failed.
        source: DeliveryError,
    },

    /// The record could not be serialized for delivery.
    #[error("failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),

    /// The peer actor is gone.
    #[error(transparent)]
    Actor(#[from] ActorError),
}

/// A message from another peer could not be applied.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The payload did not decode to a valid record.
    #[error("undecodable message: {0}")]
    Decode(#[from] DecodeError),

    /// The ledger refused the record (for example, it changes a fulfilled one).
    #[error("record rejected: {0}")]
    Rejected(#[from] LedgerError),

    /// The peer actor is gone.
    #[error(transparent)]
    Actor(#[from] ActorError),
}

/// A read-only query against the peer state failed.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The chart filter was unusable.
    #[error(transparent)]
    Chart(#[from] ChartError),

    /// The peer actor is gone.
    #[error(transparent)]
    Actor(#[from] ActorError),
}

/// Failure to start a peer.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    /// The local citizen identity could not be derived.
    #[error(transparent)]
    Identity(#[from] crate::identity::IdentityError),

    /// The peer actor stopped during startup.
    #[error(transparent)]
    Actor(#[from] ActorError),
}
