//! `Dragonfly` (Redis-compatible) ledger store.
//!
//! Each database address maps to one hash; record ids are hash fields.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `stasis:ledger:{db_address}` | Hash | record id -> JSON record |

use std::collections::HashMap;
use std::time::Duration;

use fred::prelude::*;
use futures::future::BoxFuture;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::store::{LedgerStore, SNAPSHOT_KEY, encode_snapshot};

/// Ledger store backed by a `Dragonfly` hash per database address.
#[derive(Clone)]
pub struct DragonflyStore {
    client: Client,
}

impl DragonflyStore {
    /// Connect to `Dragonfly` at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the URL cannot be parsed.
    /// Returns [`StoreError::Unavailable`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let config = Config::from_url(url)
            .map_err(|e| StoreError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        info!("Connected to Dragonfly");
        Ok(Self { client })
    }

    /// Create a client that connects in the background and keeps
    /// reconnecting with exponential backoff.
    ///
    /// Startup does not wait for `Dragonfly`. Commands issued while it is
    /// down fail with [`StoreError::Unavailable`] after `command_timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the URL cannot be parsed.
    pub fn connect_in_background(url: &str, command_timeout: Duration) -> Result<Self, StoreError> {
        let config = Config::from_url(url)
            .map_err(|e| StoreError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config)
            .with_performance_config(|perf| {
                perf.default_command_timeout = command_timeout;
            })
            .set_policy(ReconnectPolicy::new_exponential(0, 100, 30_000, 2))
            .build()?;
        let _connection = client.connect();

        info!("Dragonfly client started, connecting in background");
        Ok(Self { client })
    }

    fn hash_key(db_address: &str) -> String {
        format!("stasis:ledger:{db_address}")
    }

    async fn get_inner(&self, db_address: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let hash = Self::hash_key(db_address);
        if key == SNAPSHOT_KEY {
            let entries: HashMap<String, Vec<u8>> = self.client.hgetall(&hash).await?;
            if entries.is_empty() {
                return Err(StoreError::not_found(db_address, key));
            }
            debug!(db_address, entries = entries.len(), "snapshot read");
            return encode_snapshot(entries);
        }
        let value: Option<Vec<u8>> = self.client.hget(&hash, key).await?;
        value.ok_or_else(|| StoreError::not_found(db_address, key))
    }

    async fn put_inner(
        &self,
        db_address: &str,
        key: &str,
        value: Vec<u8>,
    ) -> Result<(), StoreError> {
        if key == SNAPSHOT_KEY {
            return Err(StoreError::ReservedKey(key.to_owned()));
        }
        let _: i64 = self
            .client
            .hset(Self::hash_key(db_address), (key, value))
            .await?;
        Ok(())
    }

    async fn delete_inner(&self, db_address: &str, key: &str) -> Result<(), StoreError> {
        let hash = Self::hash_key(db_address);
        if key == SNAPSHOT_KEY {
            let _: i64 = self.client.del(&hash).await?;
            info!(db_address, "ledger wiped");
        } else {
            let _: i64 = self.client.hdel(&hash, key).await?;
        }
        Ok(())
    }
}

impl LedgerStore for DragonflyStore {
    fn get<'a>(
        &'a self,
        db_address: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, StoreError>> {
        Box::pin(self.get_inner(db_address, key))
    }

    fn put<'a>(
        &'a self,
        db_address: &'a str,
        key: &'a str,
        value: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.put_inner(db_address, key, value))
    }

    fn delete<'a>(
        &'a self,
        db_address: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.delete_inner(db_address, key))
    }
}
