//! The [`LedgerStore`] seam and the snapshot encoding shared by backends.
//!
//! A store holds one value per record id inside a named database. Reading
//! the reserved [`SNAPSHOT_KEY`] returns every entry at once as a JSON
//! object mapping key to URL-safe base64 of the stored bytes:
//!
//! ```text
//! {"1": "eyJJRCI6MSwi...", "2": "eyJJRCI6Miwi..."}
//! ```
//!
//! Deleting [`SNAPSHOT_KEY`] wipes the whole database.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use futures::future::BoxFuture;

use crate::error::StoreError;

/// Key that addresses the whole database at once.
pub const SNAPSHOT_KEY: &str = "all";

/// A replicated key/value store holding serialized ledger records.
///
/// Implementations must be cheap to share behind an `Arc` and safe to call
/// from any task.
pub trait LedgerStore: Send + Sync {
    /// Read the bytes stored at `key`, or the snapshot for [`SNAPSHOT_KEY`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the key (or the whole database,
    /// for the snapshot) does not exist and [`StoreError::Unavailable`] if
    /// the backend cannot be reached.
    fn get<'a>(
        &'a self,
        db_address: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, StoreError>>;

    /// Store `value` at `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ReservedKey`] for [`SNAPSHOT_KEY`] and
    /// [`StoreError::Unavailable`] if the backend cannot be reached.
    fn put<'a>(
        &'a self,
        db_address: &'a str,
        key: &'a str,
        value: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Remove `key`, or every key for [`SNAPSHOT_KEY`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the backend cannot be reached.
    fn delete<'a>(
        &'a self,
        db_address: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>>;
}

/// Encode stored entries as the snapshot JSON object.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] if the map cannot be serialized.
pub fn encode_snapshot<K, V>(
    entries: impl IntoIterator<Item = (K, V)>,
) -> Result<Vec<u8>, StoreError>
where
    K: Into<String>,
    V: AsRef<[u8]>,
{
    let map: BTreeMap<String, String> = entries
        .into_iter()
        .map(|(k, v)| (k.into(), URL_SAFE.encode(v)))
        .collect();
    Ok(serde_json::to_vec(&map)?)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn snapshot_is_a_map_of_url_safe_base64() {
        let bytes = encode_snapshot([("2", b"??>".as_slice()), ("1", b"{}".as_slice())]).unwrap();
        let map: BTreeMap<String, String> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(URL_SAFE.decode(map.get("1").unwrap()).unwrap(), b"{}");
        // `??>` exercises the URL-safe alphabet (`-` rather than `+`).
        assert_eq!(map.get("2").unwrap(), "Pz8-");
    }
}
