//! REST API handlers for the news server
//!
//! `GET /api/news` answers from the snapshot cache through the refresher.
//! Every outcome carries a JSON body:
//!
//! - `200` with the record array when the snapshot is fresh
//! - `503` with `Retry-After` and the cached records (possibly none) when the
//!   refresh failed or is cooling down
//! - `500` with `{error, details?}` for faults outside the refresh boundary

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::CacheStatus;
use crate::error::AnnErrorTrait;
use crate::metrics;
use crate::models::ArticleRecord;
use crate::refresh::Served;
use crate::utils::truncate_text;

use super::{AppState, MAX_DETAIL_CHARS};

/// `code` for a degraded response that still carries records
pub const CODE_STALE_DATA: &str = "STALE_DATA";

/// `code` for a degraded response with nothing cached yet
pub const CODE_NO_DATA: &str = "NO_DATA";

// ============================================================================
// API Response Types
// ============================================================================

/// Body of a 503 from the news endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsUnavailable {
    pub error: String,
    pub code: String,
    /// Seconds until a retry is worthwhile
    pub retry_after: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
    pub cached: Vec<ArticleRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Body of a 500
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Generic 500 body; `details` is filled only in development mode
    pub fn new(details: &str, development: bool) -> Self {
        Self {
            error: String::from("Internal server error"),
            details: development.then(|| truncate_text(details, MAX_DETAIL_CHARS)),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub strategy: String,
    /// Whether `/metrics` has a registry to report
    pub metrics: bool,
    pub cache: CacheStatus,
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/news", get(get_news))
        .route("/api/health", get(health_check))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
}

// ============================================================================
// News Handler
// ============================================================================

/// Serve the news listing
async fn get_news(State(state): State<AppState>) -> Response {
    let development = state.mode.is_development();

    match state.refresher.current().await {
        Ok(Served::Fresh(snapshot)) => {
            let age = snapshot.age(Utc::now()).map(|a| a.num_seconds());
            metrics::record_api_request(200, age);
            (StatusCode::OK, Json(snapshot.records.clone())).into_response()
        }
        Ok(Served::Degraded {
            snapshot,
            reason,
            retry_after,
        }) => {
            // Round up so clients never come back before the hint expires
            let retry_secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            let (error, code) = if snapshot.is_empty() {
                ("News is not available yet", CODE_NO_DATA)
            } else {
                ("News source unavailable, serving cached data", CODE_STALE_DATA)
            };

            let age = snapshot.age(Utc::now()).map(|a| a.num_seconds());
            metrics::record_api_request(503, age);
            tracing::debug!(code, retry_secs, cached = snapshot.len(), "Serving degraded news response");

            let body = NewsUnavailable {
                error: error.to_string(),
                code: code.to_string(),
                retry_after: retry_secs,
                fetched_at: snapshot.fetched_at,
                cached: snapshot.records.clone(),
                details: development.then(|| truncate_text(&reason, MAX_DETAIL_CHARS)),
            };

            (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::RETRY_AFTER, retry_secs.to_string())],
                Json(body),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                category = e.category().as_str(),
                recoverable = e.is_recoverable(),
                "News request failed"
            );
            metrics::record_api_request(500, None);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(&e.to_string(), development)),
            )
                .into_response()
        }
    }
}

// ============================================================================
// Health Handlers
// ============================================================================

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: String::from("healthy"),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        strategy: state.refresher.strategy().to_string(),
        metrics: metrics::metrics_initialized(),
        cache: state.cache.status(Utc::now()),
    })
}

/// Prometheus text exposition
async fn metrics_endpoint() -> Response {
    match metrics::encode_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
