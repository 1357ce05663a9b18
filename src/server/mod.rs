//! HTTP server for the news API
//!
//! Wires the [`Refresher`] into an axum router and runs it with graceful
//! shutdown.

pub mod api;

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::response::{IntoResponse, Response};
use axum::{http::StatusCode, Json, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::cache::SnapshotCache;
use crate::config::{Config, RunMode};
use crate::crawler::build_fetcher;
use crate::parser::ListingExtractor;
use crate::refresh::{RefreshPolicy, Refresher};

pub use api::{create_router, ErrorResponse, HealthResponse, NewsUnavailable};

/// Longest error detail exposed in development mode
pub(crate) const MAX_DETAIL_CHARS: usize = 500;

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Cache-aware refresh coordinator
    pub refresher: Refresher,

    /// Snapshot cache, shared with the refresher
    pub cache: Arc<SnapshotCache>,

    /// Controls error detail exposure
    pub mode: RunMode,

    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    pub fn new(refresher: Refresher, mode: RunMode) -> Self {
        Self {
            cache: refresher.cache().clone(),
            refresher,
            mode,
            start_time: Instant::now(),
        }
    }
}

// ============================================================================
// News Server
// ============================================================================

/// News API server
pub struct NewsServer {
    bind_address: SocketAddr,
    enable_cors: bool,
    enable_request_logging: bool,
    state: AppState,
}

impl NewsServer {
    /// Create a server from configuration, building the fetch strategy and extractor
    pub fn new(config: &Config) -> Result<Self, ServerError> {
        config
            .validate()
            .map_err(|e| ServerError::ConfigError(e.to_string()))?;

        let fetcher = build_fetcher(config).map_err(|e| ServerError::InitError(e.to_string()))?;
        let extractor = ListingExtractor::new(&config.extractor, &config.source.base_url)
            .map_err(|e| ServerError::InitError(e.to_string()))?;

        let refresher = Refresher::new(
            fetcher,
            Arc::new(extractor),
            Arc::new(SnapshotCache::new()),
            RefreshPolicy::from_config(config),
        );

        Ok(Self::with_state(config, AppState::new(refresher, config.server.mode)))
    }

    /// Create a server around prepared state
    pub fn with_state(config: &Config, state: AppState) -> Self {
        Self {
            bind_address: config.server.bind_address,
            enable_cors: config.server.enable_cors,
            enable_request_logging: config.server.enable_request_logging,
            state,
        }
    }

    /// Get the application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the router with all routes and layers
    pub fn build_router(&self) -> Router {
        let development = self.state.mode.is_development();
        let mut router = create_router(self.state.clone()).layer(CatchPanicLayer::custom(
            move |panic: Box<dyn Any + Send + 'static>| panic_response(panic, development),
        ));

        if self.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(AnyOrigin)
                    .allow_methods(AnyOrigin)
                    .allow_headers(AnyOrigin),
            );
        }

        if self.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Start with graceful shutdown
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let router = self.build_router();
        let addr = self.bind_address;

        tracing::info!(
            %addr,
            strategy = self.state.refresher.strategy(),
            mode = ?self.state.mode,
            "Starting news server"
        );

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(e.to_string()))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::ServeError(e.to_string()))?;

        tracing::info!("News server shutdown complete");
        Ok(())
    }

    /// Get server info
    pub fn info(&self) -> ServerInfo {
        let policy = self.state.refresher.policy();
        ServerInfo {
            bind_address: self.bind_address,
            strategy: self.state.refresher.strategy(),
            ttl_secs: policy.ttl().num_seconds(),
            mode: self.state.mode,
            cors_enabled: self.enable_cors,
            request_logging_enabled: self.enable_request_logging,
        }
    }
}

/// Turn a handler panic into the standard 500 body
fn panic_response(panic: Box<dyn Any + Send + 'static>, development: bool) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        String::from("unknown panic payload")
    };

    tracing::error!(panic = %message, "Request handler panicked");
    crate::metrics::record_api_request(500, None);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(&message, development)),
    )
        .into_response()
}

/// Server information
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub bind_address: SocketAddr,
    pub strategy: &'static str,
    pub ttl_secs: i64,
    pub mode: RunMode,
    pub cors_enabled: bool,
    pub request_logging_enabled: bool,
}

impl ServerInfo {
    /// Format as display string
    pub fn display(&self) -> String {
        format!(
            "News Server\n\
             {:-<40}\n\
             Bind Address: {}\n\
             Fetch Strategy: {}\n\
             Snapshot TTL: {}s\n\
             Mode: {:?}\n\
             CORS: {}\n\
             Request Logging: {}",
            "",
            self.bind_address,
            self.strategy,
            self.ttl_secs,
            self.mode,
            if self.cors_enabled { "enabled" } else { "disabled" },
            if self.request_logging_enabled { "enabled" } else { "disabled" }
        )
    }
}

// ============================================================================
// Server Errors
// ============================================================================

/// Server errors
#[derive(Debug, Clone)]
pub enum ServerError {
    /// Configuration error
    ConfigError(String),

    /// Initialization error
    InitError(String),

    /// Failed to bind to address
    BindError(String),

    /// Server error
    ServeError(String),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Self::InitError(msg) => write!(f, "Initialization error: {}", msg),
            Self::BindError(msg) => write!(f, "Failed to bind: {}", msg),
            Self::ServeError(msg) => write!(f, "Server error: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {}

// ============================================================================
// Tests
// ============================================================================
