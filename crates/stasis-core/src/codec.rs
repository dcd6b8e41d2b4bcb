//! Wire encoding of records and ledger snapshots.
//!
//! A record travels as its JSON document. A snapshot is a JSON object
//! mapping record id to the base64 (URL-safe alphabet) of that document.
//! Padding is optional on input since peers disagree on it.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use tracing::warn;

use stasis_types::Record;

use crate::error::DecodeError;

const SNAPSHOT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Serialize a record for the store or the channel.
///
/// # Errors
///
/// Returns the serializer error; unreachable for well-formed records.
pub fn encode_record(record: &Record) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(record)
}

/// Parse and validate a record.
///
/// # Errors
///
/// Returns [`DecodeError::Json`] for malformed input and
/// [`DecodeError::Invalid`] for a record that breaks an invariant.
pub fn decode_record(bytes: &[u8]) -> Result<Record, DecodeError> {
    let record: Record = serde_json::from_slice(bytes)?;
    record.validate()?;
    Ok(record)
}

/// Decode every entry of a snapshot.
///
/// Entries are returned in ascending numeric key order so the last
/// occurrence of a duplicated record id is deterministic. Entries that fail
/// to decode are logged and skipped.
///
/// # Errors
///
/// Returns [`DecodeError::Json`] only if the snapshot itself is not a JSON
/// object of strings.
pub fn decode_snapshot(bytes: &[u8]) -> Result<Vec<Record>, DecodeError> {
    let raw: BTreeMap<String, String> = serde_json::from_slice(bytes)?;

    let mut entries: Vec<(String, String)> = raw.into_iter().collect();
    entries.sort_by_cached_key(|(key, _)| (key.parse::<u64>().unwrap_or(u64::MAX), key.clone()));

    let records = entries
        .into_iter()
        .filter_map(|(key, encoded)| match decode_entry(&key, &encoded) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(key = %key, error = %e, "skipping undecodable snapshot entry");
                None
            }
        })
        .collect();
    Ok(records)
}

fn decode_entry(key: &str, encoded: &str) -> Result<Record, DecodeError> {
    let bytes = SNAPSHOT_BASE64
        .decode(encoded)
        .map_err(|e| DecodeError::Base64 {
            key: key.to_owned(),
            message: e.to_string(),
        })?;
    decode_record(&bytes)
}
