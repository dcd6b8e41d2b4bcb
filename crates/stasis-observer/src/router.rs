//! Axum router construction for the Observer API.
//!
//! Assembles all routes into a single [`Router`] with CORS middleware
//! enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router for the Observer server.
///
/// The router includes:
/// - `GET /api/health` -- peer status
/// - `GET /api/chart` -- fulfillment chart for a period and category
/// - `GET /api/ranks` -- citizen reputation ranking
/// - `GET /api/notifications` -- visible notifications
/// - `GET /api/requests/pending` -- unfulfilled records
/// - `POST /api/demands` -- submit a demand
/// - `POST /api/requests/{id}/supply` -- supply a pending record
///
/// CORS is configured to allow any origin so a dashboard served from
/// elsewhere can reach the peer.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/chart", get(handlers::get_chart))
        .route("/api/ranks", get(handlers::list_ranks))
        .route("/api/notifications", get(handlers::list_notifications))
        .route("/api/requests/pending", get(handlers::list_pending))
        .route("/api/demands", post(handlers::submit_demand))
        .route("/api/requests/{id}/supply", post(handlers::supply_request))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
