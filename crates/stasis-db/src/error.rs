//! Error types for the ledger store.
//!
//! Every backend failure is folded into [`StoreError::Unavailable`] so
//! callers can treat "the store is down" uniformly, whatever the backend.

/// Errors that can occur in the ledger store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or the operation failed remotely.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The key does not exist in the given database.
    #[error("key not found: {db_address}/{key}")]
    NotFound {
        /// Database the lookup ran against.
        db_address: String,
        /// The missing key.
        key: String,
    },

    /// The snapshot key cannot be written directly.
    #[error("key {0:?} is reserved for the snapshot")]
    ReservedKey(String),

    /// The snapshot could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Build a [`StoreError::NotFound`].
    pub fn not_found(db_address: &str, key: &str) -> Self {
        Self::NotFound {
            db_address: db_address.to_owned(),
            key: key.to_owned(),
        }
    }
}

impl From<fred::error::Error> for StoreError {
    fn from(e: fred::error::Error) -> Self {
        Self::Unavailable(format!("Dragonfly error: {e}"))
    }
}
