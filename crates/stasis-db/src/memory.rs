//! In-process ledger store.
//!
//! Shares the semantics of [`DragonflyStore`](crate::DragonflyStore),
//! including the snapshot key. Clones share the same data, so several
//! peers in one process see one replicated ledger. An outage can be
//! simulated with [`MemoryStore::set_available`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::{LedgerStore, SNAPSHOT_KEY, encode_snapshot};

type Databases = BTreeMap<String, BTreeMap<String, Vec<u8>>>;

/// Ledger store held in memory.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    databases: Arc<RwLock<Databases>>,
    available: Arc<AtomicBool>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty, available store.
    pub fn new() -> Self {
        Self {
            databases: Arc::new(RwLock::new(BTreeMap::new())),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Toggle simulated availability. While unavailable every call fails
    /// with [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of entries in `db_address`.
    pub async fn len(&self, db_address: &str) -> usize {
        self.databases
            .read()
            .await
            .get(db_address)
            .map_or(0, BTreeMap::len)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store offline".to_owned()))
        }
    }
}

impl LedgerStore for MemoryStore {
    fn get<'a>(
        &'a self,
        db_address: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, StoreError>> {
        Box::pin(async move {
            self.check()?;
            let dbs = self.databases.read().await;
            let db = dbs
                .get(db_address)
                .filter(|db| !db.is_empty())
                .ok_or_else(|| StoreError::not_found(db_address, key))?;
            if key == SNAPSHOT_KEY {
                return encode_snapshot(db.iter().map(|(k, v)| (k.clone(), v)));
            }
            db.get(key)
                .cloned()
                .ok_or_else(|| StoreError::not_found(db_address, key))
        })
    }

    fn put<'a>(
        &'a self,
        db_address: &'a str,
        key: &'a str,
        value: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.check()?;
            if key == SNAPSHOT_KEY {
                return Err(StoreError::ReservedKey(key.to_owned()));
            }
            self.databases
                .write()
                .await
                .entry(db_address.to_owned())
                .or_default()
                .insert(key.to_owned(), value);
            Ok(())
        })
    }

    fn delete<'a>(
        &'a self,
        db_address: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.check()?;
            let mut dbs = self.databases.write().await;
            if key == SNAPSHOT_KEY {
                dbs.remove(db_address);
            } else if let Some(db) = dbs.get_mut(db_address) {
                db.remove(key);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::collections::BTreeMap;

    use base64::Engine as _;
    use base64::engine::general_purpose::URL_SAFE;

    use super::*;

    const DB: &str = "supply-demand";

    #[tokio::test]
    async fn put_get_delete() {
        let store = MemoryStore::new();
        store.put(DB, "1", b"one".to_vec()).await.unwrap();
        assert_eq!(store.get(DB, "1").await.unwrap(), b"one");

        store.delete(DB, "1").await.unwrap();
        assert!(matches!(
            store.get(DB, "1").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn empty_database_snapshot_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get(DB, SNAPSHOT_KEY).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn snapshot_contains_every_entry() {
        let store = MemoryStore::new();
        store.put(DB, "1", b"a".to_vec()).await.unwrap();
        store.put(DB, "2", b"b".to_vec()).await.unwrap();
        store.put("other", "3", b"c".to_vec()).await.unwrap();

        let raw = store.get(DB, SNAPSHOT_KEY).await.unwrap();
        let map: BTreeMap<String, String> = serde_json::from_slice(&raw).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(URL_SAFE.decode(map.get("2").unwrap()).unwrap(), b"b");
    }

    #[tokio::test]
    async fn deleting_snapshot_wipes_database() {
        let store = MemoryStore::new();
        store.put(DB, "1", b"a".to_vec()).await.unwrap();
        store.delete(DB, SNAPSHOT_KEY).await.unwrap();
        assert_eq!(store.len(DB).await, 0);
    }

    #[tokio::test]
    async fn snapshot_key_is_not_writable() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.put(DB, SNAPSHOT_KEY, Vec::new()).await,
            Err(StoreError::ReservedKey(_))
        ));
    }

    #[tokio::test]
    async fn offline_store_is_unavailable() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert!(matches!(
            store.put(DB, "1", Vec::new()).await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_available(true);
        assert!(store.put(DB, "1", Vec::new()).await.is_ok());
    }

    #[tokio::test]
    async fn clones_share_data() {
        let a = MemoryStore::new();
        let b = a.clone();
        a.put(DB, "9", b"x".to_vec()).await.unwrap();
        assert_eq!(b.get(DB, "9").await.unwrap(), b"x");
    }
}
