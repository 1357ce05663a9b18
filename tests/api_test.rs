//! Router tests for the news API
//!
//! Requests go straight through the axum router with `oneshot`; no socket
//! is bound.

mod common;

use ann_news::config::{Config, RunMode};
use ann_news::crawler::Fetcher;
use ann_news::models::Snapshot;
use ann_news::server::{AppState, NewsServer};
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Duration;
use common::{aged_snapshot, listing_with, refresher_with, CountingFetcher, PanickingFetcher};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn router(fetcher: Arc<dyn Fetcher>, seed: Snapshot, mode: RunMode) -> Router {
    let state = AppState::new(refresher_with(fetcher, seed), mode);
    NewsServer::with_state(&Config::default(), state).build_router()
}

async fn get(router: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

#[tokio::test]
async fn test_fresh_news_is_200_array() {
    let fetcher = Arc::new(CountingFetcher::ok(listing_with(4)));
    let router = router(fetcher, Snapshot::empty(), RunMode::Production);

    let (status, _, body) = get(router, "/api/news").await;

    assert_eq!(status, StatusCode::OK);
    let records = body.as_array().expect("Body should be an array");
    assert_eq!(records.len(), 4);

    let first = &records[0];
    assert_eq!(first["title"], "Headline 1");
    assert_eq!(
        first["url"],
        "https://www.animenewsnetwork.com/news/2024-03-01/headline-1/.200001"
    );
    assert_eq!(first["date"], "2024-03-01T12:00:00Z");
    assert_eq!(first["author"], "Staff Writer");
    assert_eq!(first["timestamp"], 1_709_294_400_000_i64);
}

#[tokio::test]
async fn test_failure_with_cache_is_503_with_records() {
    let fetcher = Arc::new(CountingFetcher::failing());
    let router = router(
        fetcher,
        aged_snapshot(3, Duration::hours(2)),
        RunMode::Production,
    );

    let (status, headers, body) = get(router, "/api/news").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(headers.contains_key(header::RETRY_AFTER));
    assert_eq!(body["code"], "STALE_DATA");
    assert_eq!(body["cached"].as_array().unwrap().len(), 3);
    assert!(body["fetchedAt"].is_string());
    assert!(body["error"].is_string());
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn test_failure_without_cache_is_503_empty() {
    let fetcher = Arc::new(CountingFetcher::failing());
    let router = router(fetcher, Snapshot::empty(), RunMode::Production);

    let (status, headers, body) = get(router, "/api/news").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(headers.get(header::RETRY_AFTER).unwrap(), "60");
    assert_eq!(body["code"], "NO_DATA");
    assert_eq!(body["retryAfter"], 60);
    assert_eq!(body["cached"], serde_json::json!([]));
    assert!(body.get("fetchedAt").is_none());
}

#[tokio::test]
async fn test_degraded_details_in_development() {
    let fetcher = Arc::new(CountingFetcher::failing());
    let router = router(fetcher, Snapshot::empty(), RunMode::Development);

    let (status, _, body) = get(router, "/api/news").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["details"].as_str().unwrap().contains("timeout"));
}

#[tokio::test]
async fn test_internal_fault_is_500_without_details() {
    let router = router(
        Arc::new(PanickingFetcher),
        Snapshot::empty(),
        RunMode::Production,
    );

    let (status, _, body) = get(router, "/api/news").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn test_internal_fault_details_in_development() {
    let router = router(
        Arc::new(PanickingFetcher),
        Snapshot::empty(),
        RunMode::Development,
    );

    let (status, _, body) = get(router, "/api/news").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["details"].is_string());
}

#[tokio::test]
async fn test_health_reports_cache() {
    let fetcher = Arc::new(CountingFetcher::ok(listing_with(1)));
    let router = router(
        fetcher,
        aged_snapshot(3, Duration::minutes(10)),
        RunMode::Production,
    );

    let (status, _, body) = get(router, "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["strategy"], "counting");
    assert_eq!(body["cache"]["records"], 3);
    assert!(body["cache"]["ageSecs"].as_i64().unwrap() >= 600);
}

#[tokio::test]
async fn test_health_reports_metrics_registry() {
    let _ = ann_news::metrics::init_metrics();
    let fetcher = Arc::new(CountingFetcher::ok(listing_with(1)));
    let router = router(fetcher, Snapshot::empty(), RunMode::Production);

    let (status, _, body) = get(router, "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metrics"], true);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let _ = ann_news::metrics::init_metrics();
    let fetcher = Arc::new(CountingFetcher::ok(listing_with(1)));
    let router = router(fetcher, Snapshot::empty(), RunMode::Production);

    let response = router
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("ann_news_"));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let fetcher = Arc::new(CountingFetcher::ok(listing_with(1)));
    let router = router(fetcher, Snapshot::empty(), RunMode::Production);

    let (status, _, _) = get(router, "/api/nothing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
