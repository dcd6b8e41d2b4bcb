//! Type-safe identifier wrappers.
//!
//! Record and notification identifiers are small positive integers assigned
//! sequentially by the peer that creates them. Citizen identifiers are
//! opaque strings derived from a peer's network identity (see
//! `stasis_core::identity`).

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Generates a newtype wrapper around a sequential `u64` with standard derives.
macro_rules! define_seq_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[serde(transparent)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub u64);

        impl $name {
            /// The first identifier handed out on an empty sequence.
            pub const FIRST: Self = Self(1);

            /// Wrap a raw sequence value.
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Return the inner sequence value.
            pub const fn get(self) -> u64 {
                self.0
            }

            /// Return the identifier that follows this one, or `None` on
            /// overflow.
            pub const fn next(self) -> Option<Self> {
                match self.0.checked_add(1) {
                    Some(v) => Some(Self(v)),
                    None => None,
                }
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl core::str::FromStr for $name {
            type Err = core::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<u64>().map(Self)
            }
        }
    };
}

define_seq_id! {
    /// Identifier of a demand/supply record.
    ///
    /// Assigned by the originating peer as one past the highest id in its
    /// local ledger. Unique across peers only after a full bootstrap scan.
    RecordId
}

define_seq_id! {
    /// Identifier of a notification, unique within one peer process.
    NotificationId
}

/// Opaque, obfuscated identifier of a participating citizen.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export, export_to = "bindings/")]
pub struct CitizenId(pub String);

impl CitizenId {
    /// Wrap a raw citizen identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is the empty string.
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl core::fmt::Display for CitizenId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CitizenId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}
