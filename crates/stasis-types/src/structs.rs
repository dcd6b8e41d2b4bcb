//! Core entity structs: ledger records, rankings, and notifications.
//!
//! [`Record`] keeps the field names used on the wire by every peer
//! (`ID`, `CitizenID`, `FulfilledBy`, ...). Peers that predate optional
//! fulfillment fields send an empty `FulfilledBy` and the zero timestamp
//! `0001-01-01T00:00:00Z` for pending records; both decode as absent.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

use crate::enums::{Category, Severity};
use crate::error::RecordError;
use crate::ids::{CitizenId, NotificationId, RecordId};

/// Unix seconds of `0001-01-01T00:00:00Z`, the zero timestamp legacy peers
/// emit for "not set".
const ZERO_TIME_SECS: i64 = -62_135_596_800;

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One demand event and, once someone supplies it, its fulfillment.
///
/// A record moves from pending to fulfilled at most once; the fulfilled
/// state is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Record {
    /// Sequential id assigned by the originating peer.
    #[serde(rename = "ID")]
    pub id: RecordId,
    /// The citizen who asked.
    #[serde(rename = "CitizenID")]
    pub citizen_id: CitizenId,
    /// What was asked for.
    #[serde(rename = "Category")]
    pub category: Category,
    /// How much was asked for.
    #[serde(rename = "Quantity")]
    #[ts(as = "String")]
    pub quantity: Decimal,
    /// Free-text details.
    #[serde(rename = "Details", default)]
    pub details: String,
    /// When the demand was created.
    #[serde(rename = "CreatedAt")]
    pub created_at: DateTime<Utc>,
    /// Whether the demand has been supplied.
    #[serde(rename = "Fulfilled", default)]
    pub fulfilled: bool,
    /// The citizen who supplied it; present iff `fulfilled`.
    #[serde(
        rename = "FulfilledBy",
        default,
        deserialize_with = "empty_citizen_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional)]
    pub fulfilled_by: Option<CitizenId>,
    /// When it was supplied; present iff `fulfilled`.
    #[serde(
        rename = "FulfilledAt",
        default,
        deserialize_with = "zero_time_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional)]
    pub fulfilled_at: Option<DateTime<Utc>>,
}

impl Record {
    /// Create a new pending record.
    pub const fn pending(
        id: RecordId,
        citizen_id: CitizenId,
        category: Category,
        quantity: Decimal,
        details: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            citizen_id,
            category,
            quantity,
            details,
            created_at,
            fulfilled: false,
            fulfilled_by: None,
            fulfilled_at: None,
        }
    }

    /// Whether the record still awaits a supplier.
    pub const fn is_pending(&self) -> bool {
        !self.fulfilled
    }

    /// Check the structural invariants of the record.
    ///
    /// # Errors
    ///
    /// Returns the first [`RecordError`] found.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.id.get() == 0 {
            return Err(RecordError::ZeroId);
        }
        if self.citizen_id.is_empty() {
            return Err(RecordError::MissingCitizen(self.id));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(RecordError::NonPositiveQuantity {
                id: self.id,
                quantity: self.quantity.to_string(),
            });
        }
        match (self.fulfilled, &self.fulfilled_by, self.fulfilled_at) {
            (false, None, None) => Ok(()),
            (true, Some(by), Some(at)) if !by.is_empty() => {
                if at < self.created_at {
                    Err(RecordError::FulfilledBeforeCreated(self.id))
                } else {
                    Ok(())
                }
            }
            _ => Err(RecordError::InconsistentFulfillment(self.id)),
        }
    }

    /// Return the fulfilled version of this record.
    ///
    /// `at` is clamped to `created_at` so clock skew between the requesting
    /// and supplying peers cannot break the ordering invariant.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::AlreadyFulfilled`] if the record is terminal,
    /// or [`RecordError::InconsistentFulfillment`] if `by` is empty.
    pub fn fulfilled_by(&self, by: CitizenId, at: DateTime<Utc>) -> Result<Self, RecordError> {
        if self.fulfilled {
            return Err(RecordError::AlreadyFulfilled(self.id));
        }
        if by.is_empty() {
            return Err(RecordError::InconsistentFulfillment(self.id));
        }
        Ok(Self {
            fulfilled: true,
            fulfilled_by: Some(by),
            fulfilled_at: Some(at.max(self.created_at)),
            ..self.clone()
        })
    }
}

fn empty_citizen_as_none<'de, D>(deserializer: D) -> Result<Option<CitizenId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()).map(CitizenId))
}

fn zero_time_as_none<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<DateTime<Utc>> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|t| t.timestamp() > ZERO_TIME_SECS))
}

/// The citizen-supplied part of a new demand; the peer fills in the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DemandDraft {
    /// What is needed.
    pub category: Category,
    /// How much.
    #[ts(as = "String")]
    pub quantity: Decimal,
    /// Optional free-text details.
    #[serde(default)]
    pub details: String,
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Reputation standing of one citizen, recomputed from the full ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Ranking {
    /// The citizen ranked.
    pub citizen_id: CitizenId,
    /// Records this citizen requested.
    pub demands: u64,
    /// Records this citizen fulfilled.
    pub supplies: u64,
    /// Share of all demands, in `[0, 1]`.
    pub demand_ratio: f64,
    /// Share of all supplies, in `[0, 1]`.
    pub supply_ratio: f64,
    /// `(supply_ratio - demand_ratio) * personal / total activity`.
    pub reputation_index: f64,
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// A short-lived message shown to the local citizen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Notification {
    /// Sequential id within this peer.
    pub id: NotificationId,
    /// How the message is styled.
    pub severity: Severity,
    /// Headline.
    pub title: String,
    /// Body text.
    pub body: String,
    /// When it was raised.
    pub raised_at: DateTime<Utc>,
    /// When it disappears.
    pub expires_at: DateTime<Utc>,
}

impl Notification {
    /// Whether the notification is still visible at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}
