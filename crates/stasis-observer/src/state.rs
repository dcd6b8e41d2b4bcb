//! Shared application state for the Observer API server.
//!
//! [`AppState`] holds the peer's [`RecordIngestor`]. Submissions go through
//! it so they are stored and broadcast; queries go straight to the peer
//! actor through its handle. The observer never touches the ledger itself.

use std::sync::Arc;

use stasis_core::{PeerHandle, RecordIngestor};

/// Shared state for all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    ingestor: Arc<RecordIngestor>,
}

impl AppState {
    /// Create state serving the peer behind `ingestor`.
    pub const fn new(ingestor: Arc<RecordIngestor>) -> Self {
        Self { ingestor }
    }

    /// The ingestor for submissions.
    pub const fn ingestor(&self) -> &Arc<RecordIngestor> {
        &self.ingestor
    }

    /// The actor for read-only queries.
    pub fn peer(&self) -> &PeerHandle {
        self.ingestor.peer()
    }
}
