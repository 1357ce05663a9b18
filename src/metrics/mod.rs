//! Prometheus metrics for the news service
//!
//! This module provides metrics tracking for:
//! - Refresh: attempts by outcome, duration, records extracted
//! - API: responses by status, snapshot age at serve time
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Encoder, Gauge, Histogram, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for refresh metrics
struct RefreshMetrics {
    attempts: CounterVec,
    duration: Histogram,
    records: Gauge,
    coalesced: Counter,
}

/// Container for API metrics
struct ApiMetrics {
    requests: CounterVec,
    snapshot_age: Gauge,
}

/// Global storage for refresh metrics
static REFRESH_METRICS: OnceLock<RefreshMetrics> = OnceLock::new();

/// Global storage for API metrics
static API_METRICS: OnceLock<ApiMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// This function should be called once at application startup.
/// If metric registration fails, subsequent metric operations become no-ops.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = ann_news::metrics::init_metrics() {
///     tracing::warn!("Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let refresh = RefreshMetrics {
        attempts: register_counter_vec!(
            "ann_news_refresh_total",
            "Refresh attempts by outcome",
            &["outcome"]
        )?,
        duration: register_histogram!(
            "ann_news_refresh_duration_seconds",
            "Time spent fetching and extracting the listing",
            vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0]
        )?,
        records: register_gauge!(
            "ann_news_records_extracted",
            "Records in the most recent successful snapshot"
        )?,
        coalesced: register_counter!(
            "ann_news_refresh_coalesced_total",
            "Stale reads answered by another request's refresh"
        )?,
    };

    let api = ApiMetrics {
        requests: register_counter_vec!(
            "ann_news_requests_total",
            "News API responses by status code",
            &["status"]
        )?,
        snapshot_age: register_gauge!(
            "ann_news_snapshot_age_seconds",
            "Age of the served snapshot in seconds"
        )?,
    };

    REFRESH_METRICS
        .set(refresh)
        .map_err(|_| "Refresh metrics already initialized")?;
    API_METRICS
        .set(api)
        .map_err(|_| "API metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    REFRESH_METRICS.get().is_some() && API_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Histogram timer guard that records duration on drop
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl MetricsTimer {
    fn new(timer: prometheus::HistogramTimer) -> Self {
        Self { timer: Some(timer) }
    }

    /// Create a no-op timer when metrics are not initialized
    fn noop() -> Self {
        Self { timer: None }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop_and_record();
        }
    }
}

/// Start a refresh timer
pub fn start_refresh_timer() -> MetricsTimer {
    match REFRESH_METRICS.get() {
        Some(m) => MetricsTimer::new(m.duration.start_timer()),
        None => MetricsTimer::noop(),
    }
}

/// Record a refresh outcome (`success`, `timeout`, `http_status`, `network`, `empty`, `panic`)
pub fn record_refresh(outcome: &str) {
    if let Some(m) = REFRESH_METRICS.get() {
        m.attempts.with_label_values(&[outcome]).inc();
    }
}

/// Record the record count of a freshly installed snapshot
pub fn record_snapshot_size(count: usize) {
    if let Some(m) = REFRESH_METRICS.get() {
        m.records.set(count as f64);
    }
}

/// Record a stale read that was satisfied by a concurrent refresh
pub fn record_coalesced() {
    if let Some(m) = REFRESH_METRICS.get() {
        m.coalesced.inc();
    }
}

/// Record a news API response
pub fn record_api_request(status: u16, snapshot_age_secs: Option<i64>) {
    let Some(m) = API_METRICS.get() else {
        return;
    };

    let status_str = status.to_string();
    m.requests.with_label_values(&[&status_str]).inc();

    if let Some(age) = snapshot_age_secs {
        m.snapshot_age.set(age.max(0) as f64);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ensure_metrics_initialized() {
        let _ = init_metrics();
    }

    #[test]
    fn test_init_metrics() {
        let result = init_metrics();
        assert!(result.is_ok());

        // Second call should also be Ok (idempotent)
        let result2 = init_metrics();
        assert!(result2.is_ok());
    }

    #[test]
    fn test_metrics_initialized() {
        ensure_metrics_initialized();
        assert!(metrics_initialized());
    }

    #[test]
    fn test_encode_metrics() {
        ensure_metrics_initialized();
        record_refresh("success");
        let text = encode_metrics().unwrap();
        assert!(text.contains("ann_news_refresh_total"));
    }

    #[test]
    fn test_refresh_recording() {
        ensure_metrics_initialized();
        {
            let _timer = start_refresh_timer();
        }
        record_refresh("timeout");
        record_snapshot_size(10);
        record_coalesced();
    }

    #[test]
    fn test_api_request_recording() {
        ensure_metrics_initialized();
        record_api_request(200, Some(120));
        record_api_request(503, None);
        record_api_request(200, Some(-5));
    }

    #[test]
    fn test_metrics_noop_without_init() {
        // These should not panic even if called before initialization
        record_refresh("empty");
        record_snapshot_size(0);
        record_coalesced();
        record_api_request(500, None);
        let _timer = start_refresh_timer();
    }
}
