//! Validation errors for shared types.

use crate::ids::RecordId;

/// A record violates one of its structural invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Record ids start at 1.
    #[error("record id must be positive")]
    ZeroId,

    /// Every record names the citizen that requested it.
    #[error("record {0} has an empty citizen id")]
    MissingCitizen(RecordId),

    /// Quantity must be strictly positive.
    #[error("record {id} has non-positive quantity {quantity}")]
    NonPositiveQuantity {
        /// The offending record.
        id: RecordId,
        /// The quantity as encoded.
        quantity: String,
    },

    /// `fulfilled` is set but the fulfiller or timestamp is missing, or the
    /// reverse.
    #[error("record {0} has inconsistent fulfillment fields")]
    InconsistentFulfillment(RecordId),

    /// The fulfillment timestamp precedes creation.
    #[error("record {0} was fulfilled before it was created")]
    FulfilledBeforeCreated(RecordId),

    /// Fulfilled records are terminal.
    #[error("record {0} is already fulfilled")]
    AlreadyFulfilled(RecordId),
}

/// A string did not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    /// What was being parsed (e.g. `"period"`).
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl ParseEnumError {
    /// Build an error for `kind` rejecting `value`.
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}
