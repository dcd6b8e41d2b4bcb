//! REST API endpoint handlers for the Observer server.
//!
//! Queries go to the peer actor; submissions go through the
//! [`RecordIngestor`](stasis_core::RecordIngestor) so they are stored and
//! broadcast like any other local action.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/health` | Peer status and degraded flag |
//! | `GET` | `/api/chart` | Fulfillment chart (`?period=&category=&scope=`) |
//! | `GET` | `/api/ranks` | Citizen ranking |
//! | `GET` | `/api/notifications` | Visible notifications |
//! | `GET` | `/api/requests/pending` | Unfulfilled records in id order |
//! | `POST` | `/api/demands` | Submit a demand |
//! | `POST` | `/api/requests/{id}/supply` | Supply a pending record |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde_json::Value;
use tracing::warn;

use stasis_core::{Submission, SubmitError};
use stasis_types::{
    CategoryFilter, ChartFilter, CustomLayout, DemandDraft, Period, Record, RecordId, StatsScope,
};

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for the `GET /api/chart` endpoint.
#[derive(Debug, Default, serde::Deserialize)]
pub struct ChartQuery {
    /// `hour`, `day`, `week`, `month`, `year` or `custom` (default `hour`).
    pub period: Option<String>,
    /// `all` or a category name (default `all`).
    pub category: Option<String>,
    /// `global` or `personal` (default `global`).
    pub scope: Option<String>,
    /// Bucket count for `period=custom`.
    pub buckets: Option<u32>,
    /// Bucket width in seconds for `period=custom`.
    pub width_secs: Option<u32>,
}

impl ChartQuery {
    /// Turn the raw parameters into a filter.
    ///
    /// # Errors
    ///
    /// Returns [`ObserverError::InvalidQuery`] for an unknown selector.
    pub fn into_filter(self) -> Result<ChartFilter, ObserverError> {
        let period = parse_or_default::<Period>(self.period.as_deref())?;
        let category = parse_or_default::<CategoryFilter>(self.category.as_deref())?;
        let scope = parse_or_default::<StatsScope>(self.scope.as_deref())?;
        let custom = match (self.buckets, self.width_secs) {
            (Some(bucket_count), Some(bucket_width_secs)) => Some(CustomLayout {
                bucket_count,
                bucket_width_secs,
            }),
            (None, None) => None,
            _ => {
                return Err(ObserverError::InvalidQuery(
                    "buckets and width_secs must be given together".to_owned(),
                ));
            }
        };
        Ok(ChartFilter {
            period,
            category,
            scope,
            custom,
        })
    }
}

fn parse_or_default<T>(raw: Option<&str>) -> Result<T, ObserverError>
where
    T: core::str::FromStr + Default,
    T::Err: core::fmt::Display,
{
    raw.map_or_else(
        || Ok(T::default()),
        |raw| {
            raw.parse()
                .map_err(|e: T::Err| ObserverError::InvalidQuery(e.to_string()))
        },
    )
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Peer status.
///
/// `degraded` is true while the shared ledger has not been loaded since
/// startup.
pub async fn health(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ObserverError> {
    let status = state.peer().status().await?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "peer": status,
        "degraded": state.ingestor().is_degraded(),
    })))
}

/// Aggregate the ledger for one chart.
///
/// # Query Parameters
///
/// - `period` -- time window (default `hour`)
/// - `category` -- `all` or one category (default `all`)
/// - `scope` -- `global` or `personal` (default `global`)
/// - `buckets`, `width_secs` -- layout for `period=custom`
pub async fn get_chart(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ChartQuery>,
) -> Result<Json<Value>, ObserverError> {
    let filter = params.into_filter()?;
    let chart = state.peer().chart(filter).await?;
    Ok(Json(serde_json::json!(chart)))
}

/// All known citizens, best reputation first.
pub async fn list_ranks(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ObserverError> {
    let ranks = state.peer().rankings().await?;
    Ok(Json(serde_json::json!({
        "count": ranks.len(),
        "ranks": ranks,
    })))
}

/// Notifications that have not expired yet.
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ObserverError> {
    let notifications = state.peer().notifications().await?;
    Ok(Json(serde_json::json!({
        "count": notifications.len(),
        "notifications": notifications,
    })))
}

/// Unfulfilled records in id order.
pub async fn list_pending(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ObserverError> {
    let pending = state.peer().pending().await?;
    Ok(Json(serde_json::json!({
        "count": pending.len(),
        "requests": pending,
    })))
}

// ---------------------------------------------------------------------------
// Submissions
// ---------------------------------------------------------------------------

/// Submit a demand on behalf of the local citizen.
///
/// Returns `201 Created` once the record is stored and broadcast, or
/// `202 Accepted` when it was applied locally but could not be delivered.
pub async fn submit_demand(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<DemandDraft>,
) -> Result<(StatusCode, Json<Value>), ObserverError> {
    submitted(
        state.ingestor().submit(Submission::Demand(draft)).await,
        StatusCode::CREATED,
    )
}

/// Fulfill a pending record as the local citizen.
///
/// Returns `200 OK` once delivered, `202 Accepted` when only applied
/// locally, `404` for an unknown record and `409` if it is already
/// fulfilled.
pub async fn supply_request(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<(StatusCode, Json<Value>), ObserverError> {
    let id: RecordId = id_str
        .parse()
        .map_err(|_invalid| ObserverError::invalid_id(&id_str))?;
    submitted(
        state.ingestor().submit(Submission::Supply(id)).await,
        StatusCode::OK,
    )
}

fn submitted(
    result: Result<Record, SubmitError>,
    delivered: StatusCode,
) -> Result<(StatusCode, Json<Value>), ObserverError> {
    match result {
        Ok(record) => Ok((delivered, Json(serde_json::json!({ "record": record })))),
        Err(SubmitError::NotDelivered { record, source }) => {
            warn!(id = %record.id, error = %source, "record kept local only");
            Ok((
                StatusCode::ACCEPTED,
                Json(serde_json::json!({
                    "record": record,
                    "warning": source.to_string(),
                })),
            ))
        }
        Err(e) => Err(e.into()),
    }
}
