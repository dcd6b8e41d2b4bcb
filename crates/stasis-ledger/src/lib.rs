//! Local replica of the Cyber Stasis demand/supply ledger.
//!
//! Every peer holds a full copy of the shared ledger. Records arrive from a
//! bootstrap snapshot, from other peers over the broadcast channel, and from
//! the local citizen; all of them pass through the same merge rules.
//!
//! # Architecture
//!
//! - [`ledger`] -- The [`Ledger`] map with merge rules and id assignment.
//! - [`index`] -- The [`CategoryIndex`] derived from the ledger.
//! - [`ranking`] -- Full recomputation of citizen reputation.
//!
//! # Terminal state
//!
//! A record moves from pending to fulfilled at most once. Any attempt to
//! change a fulfilled record is rejected with
//! [`LedgerError::AlreadyFulfilled`]; the ledger never panics.
//!
//! # Usage
//!
//! ```
//! use chrono::Utc;
//! use rust_decimal::Decimal;
//! use stasis_ledger::{Ledger, ranking};
//! use stasis_types::{Category, CitizenId, DemandDraft};
//!
//! let mut ledger = Ledger::new();
//! let draft = DemandDraft {
//!     category: Category::Water,
//!     quantity: Decimal::new(2, 0),
//!     details: String::new(),
//! };
//! let record = ledger
//!     .append_demand(CitizenId::from("alice"), draft, Utc::now())
//!     .ok();
//! assert!(record.is_some());
//!
//! let rankings = ranking::recompute(&ledger);
//! assert_eq!(rankings.len(), 1);
//! ```

pub mod index;
pub mod ledger;
pub mod ranking;

// Re-export primary types at crate root.
pub use index::CategoryIndex;
pub use ledger::{Ledger, Upsert};

use stasis_types::{RecordError, RecordId};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when mutating the ledger.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The record breaks a structural invariant.
    #[error("invalid record: {0}")]
    Invalid(#[from] RecordError),

    /// The record is fulfilled and cannot change.
    #[error("record {0} is already fulfilled")]
    AlreadyFulfilled(RecordId),

    /// No record with this id exists.
    #[error("record {0} not found")]
    NotFound(RecordId),

    /// The highest id is `u64::MAX`; no further ids can be assigned.
    #[error("record id space exhausted")]
    IdSpaceExhausted,
}
