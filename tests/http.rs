use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use limit_service::clock::{ManualClock, MILLIS_PER_HOUR};
use limit_service::config::{LimitManagerConfig, LimitsConfig, Thresholds};
use limit_service::limits::LimitManager;
use limit_service::metrics::Metrics;
use limit_service::server::{router, AppState};
use limit_service::store::{InMemoryStore, TimestampStore};
use limit_service::subscription::StaticSubscriptions;

const NOW: i64 = 1_700_000_000_000;

struct Harness {
    app: Router,
    store: Arc<InMemoryStore>,
    clock: Arc<ManualClock>,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::new(NOW));
    let limits = LimitsConfig::new(LimitManagerConfig {
        duration_in_hours: 24,
        thresholds: Thresholds { subscribed: 10, not_subscribed: 3 },
    });
    let limit_manager = Arc::new(LimitManager::new(
        limits,
        store.clone(),
        clock.clone(),
        Arc::new(Metrics::new()),
    ));
    let subscriptions = Arc::new(StaticSubscriptions::new(["premium"]));

    Harness {
        app: router(AppState { limit_manager, subscriptions }),
        store,
        clock,
    }
}

async fn call(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_is_ok() {
    let h = harness();
    let (status, _) = call(&h.app, Method::GET, "/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn reports_limit_for_free_and_paid_tiers() {
    let h = harness();
    for offset in 0..3 {
        h.store.insert("bob", "home-suggestions", NOW - offset).await.unwrap();
    }

    let (status, body) = call(&h.app, Method::GET, "/v1/users/bob/limits/home-suggestions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(body["threshold"], 3);
    assert_eq!(body["reached"], true);

    let (_, body) = call(
        &h.app,
        Method::GET,
        "/v1/users/bob/limits/home-suggestions?subscribed=true",
    )
    .await;
    assert_eq!(body["threshold"], 10);
    assert_eq!(body["reached"], false);
}

#[tokio::test]
async fn subscription_source_picks_threshold() {
    let h = harness();
    let (_, body) = call(&h.app, Method::GET, "/v1/users/premium/limits/home-suggestions").await;
    assert_eq!(body["threshold"], 10);
}

#[tokio::test]
async fn records_timestamp_at_clock_time() {
    let h = harness();
    h.clock.advance(MILLIS_PER_HOUR);

    let (status, body) = call(
        &h.app,
        Method::POST,
        "/v1/users/bob/limits/home-suggestions/timestamps",
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["timestamp_millis"], NOW + MILLIS_PER_HOUR);
    assert!(body["id"].is_string());
    assert_eq!(h.store.len("bob", "home-suggestions"), 1);
}

#[tokio::test]
async fn acquire_returns_429_once_reached() {
    let h = harness();
    let uri = "/v1/users/bob/limits/home-suggestions/acquire";

    for expected in 1..=3 {
        let (status, body) = call(&h.app, Method::POST, uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["admitted"], true);
        assert_eq!(body["limit"]["count"], expected);
    }

    let (status, body) = call(&h.app, Method::POST, uri).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["admitted"], false);
    assert_eq!(h.store.len("bob", "home-suggestions"), 3);

    h.clock.advance(24 * MILLIS_PER_HOUR + 1);
    let (status, _) = call(&h.app, Method::POST, uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.store.len("bob", "home-suggestions"), 1);
}

#[tokio::test]
async fn invalid_key_is_bad_request() {
    let h = harness();
    let (status, body) = call(&h.app, Method::GET, "/v1/users/bob/limits/a%2Fb").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("collection"));
}
