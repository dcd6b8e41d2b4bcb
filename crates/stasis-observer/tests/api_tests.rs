//! Integration tests for the Observer API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. Each test runs a real peer on the in-memory
//! store and the loopback hub.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use stasis_core::{LoopbackHub, PeerRuntime, StasisConfig};
use stasis_db::MemoryStore;
use stasis_observer::router::build_router;
use stasis_observer::state::AppState;
use tower::ServiceExt;

struct Harness {
    router: Router,
    hub: LoopbackHub,
    runtime: PeerRuntime,
}

async fn harness() -> Harness {
    let hub = LoopbackHub::new();
    let runtime = PeerRuntime::start(
        &StasisConfig::default(),
        Arc::new(MemoryStore::new()),
        Arc::new(hub.channel("QmObserverPeer000001")),
    )
    .await
    .unwrap();
    let state = Arc::new(AppState::new(Arc::clone(runtime.ingestor())));
    Harness {
        router: build_router(state),
        hub,
        runtime,
    }
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

async fn post(router: &Router, uri: &str, json: Option<Value>) -> (StatusCode, Value) {
    let request = match json {
        Some(json) => Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => Request::post(uri).body(Body::empty()).unwrap(),
    };
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

fn water_demand() -> Value {
    serde_json::json!({
        "category": "Water",
        "quantity": "20",
        "details": "litres",
    })
}

#[tokio::test]
async fn health_reports_peer_status() {
    let h = harness().await;
    let (status, json) = get(&h.router, "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["degraded"], false);
    assert_eq!(json["peer"]["citizen_id"], h.runtime.citizen().as_str());
    assert_eq!(json["peer"]["records"], 0);
    h.runtime.shutdown().await;
}

#[tokio::test]
async fn new_citizen_is_welcomed() {
    let h = harness().await;
    let (status, json) = get(&h.router, "/api/notifications").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);
    assert_eq!(json["notifications"][0]["title"], "Welcome to Cyber Stasis!");
    h.runtime.shutdown().await;
}

#[tokio::test]
async fn demand_then_supply_round_trip() {
    let h = harness().await;

    let (status, json) = post(&h.router, "/api/demands", Some(water_demand())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["record"]["ID"], 1);
    assert_eq!(json["record"]["Category"], "Water");
    assert_eq!(json["record"]["Fulfilled"], false);

    let (status, json) = get(&h.router, "/api/requests/pending").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);
    assert_eq!(json["requests"][0]["ID"], 1);

    let (status, json) = post(&h.router, "/api/requests/1/supply", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["record"]["Fulfilled"], true);

    let (_, json) = get(&h.router, "/api/requests/pending").await;
    assert_eq!(json["count"], 0);

    let (status, json) = get(&h.router, "/api/ranks").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);

    h.runtime.shutdown().await;
}

#[tokio::test]
async fn supplying_twice_conflicts() {
    let h = harness().await;
    post(&h.router, "/api/demands", Some(water_demand())).await;
    post(&h.router, "/api/requests/1/supply", None).await;

    let (status, json) = post(&h.router, "/api/requests/1/supply", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["status"], 409);
    h.runtime.shutdown().await;
}

#[tokio::test]
async fn supplying_unknown_record_is_not_found() {
    let h = harness().await;
    let (status, json) = post(&h.router, "/api/requests/999/supply", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], 404);
    h.runtime.shutdown().await;
}

#[tokio::test]
async fn malformed_record_id_is_bad_request() {
    let h = harness().await;
    let (status, json) = post(&h.router, "/api/requests/abc/supply", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("abc"));
    h.runtime.shutdown().await;
}

#[tokio::test]
async fn chart_defaults_to_last_hour() {
    let h = harness().await;
    post(&h.router, "/api/demands", Some(water_demand())).await;

    let (status, json) = get(&h.router, "/api/chart").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["filter"]["period"], "hour");
    assert_eq!(json["points"].as_array().unwrap().len(), 1);
    assert_eq!(json["points"][0]["count"], 1);
    h.runtime.shutdown().await;
}

#[tokio::test]
async fn chart_filters_by_category() {
    let h = harness().await;
    post(&h.router, "/api/demands", Some(water_demand())).await;

    let (status, json) = get(&h.router, "/api/chart?period=day&category=food").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["points"].as_array().unwrap().is_empty());
    h.runtime.shutdown().await;
}

#[tokio::test]
async fn chart_rejects_unknown_period() {
    let h = harness().await;
    let (status, json) = get(&h.router, "/api/chart?period=decade").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], 400);
    h.runtime.shutdown().await;
}

#[tokio::test]
async fn chart_rejects_half_a_custom_layout() {
    let h = harness().await;
    let (status, _) = get(&h.router, "/api/chart?period=custom&buckets=4").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    h.runtime.shutdown().await;
}

#[tokio::test]
async fn undelivered_demand_is_accepted_with_warning() {
    let h = harness().await;
    h.hub.set_available(false);

    let (status, json) = post(&h.router, "/api/demands", Some(water_demand())).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["record"]["ID"], 1);
    assert!(json["warning"].is_string());

    let (_, json) = get(&h.router, "/api/requests/pending").await;
    assert_eq!(json["count"], 1);

    h.hub.set_available(true);
    h.runtime.shutdown().await;
}
