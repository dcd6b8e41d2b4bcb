//! Error types for the Observer API server.
//!
//! [`ObserverError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use stasis_core::{ActorError, LedgerError, QueryError, SubmitError};
use stasis_types::RecordId;

/// Errors that can occur in the Observer API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// An invalid query parameter or path segment was provided.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The request conflicts with the ledger (the record is already fulfilled).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The peer is not running.
    #[error("peer unavailable: {0}")]
    Unavailable(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ObserverError {
    /// A path id that is not a record id.
    pub fn invalid_id(raw: &str) -> Self {
        Self::InvalidQuery(format!("invalid record id: {raw}"))
    }

    /// An unknown record.
    pub fn record_not_found(id: RecordId) -> Self {
        Self::NotFound(format!("record {id}"))
    }
}

impl From<ActorError> for ObserverError {
    fn from(e: ActorError) -> Self {
        Self::Unavailable(e.to_string())
    }
}

impl From<QueryError> for ObserverError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::Chart(e) => Self::InvalidQuery(e.to_string()),
            QueryError::Actor(e) => e.into(),
        }
    }
}

impl From<SubmitError> for ObserverError {
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::Rejected(LedgerError::NotFound(id)) => Self::record_not_found(id),
            SubmitError::Rejected(e @ LedgerError::AlreadyFulfilled(_)) => {
                Self::Conflict(e.to_string())
            }
            SubmitError::Rejected(e) => Self::InvalidQuery(e.to_string()),
            SubmitError::Actor(e) => e.into(),
            e @ (SubmitError::NotDelivered { .. } | SubmitError::Encode(_)) => {
                Self::Internal(e.to_string())
            }
        }
    }
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::InvalidQuery(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
