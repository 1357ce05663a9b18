//! ann-news - Anime News Network headline scraper
//!
//! Scrapes the Anime News Network news listing, keeps the latest extraction
//! in an in-memory snapshot, and serves it as JSON with TTL-based refresh.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`crawler`] - Fetch strategies (direct HTTP, rendered browser)
//! - [`parser`] - Listing extraction and selector handling
//! - [`models`] - Article records and snapshots
//! - [`cache`] - Snapshot cache with atomic replacement
//! - [`refresh`] - Staleness policy and single-flight refresh
//! - [`server`] - HTTP API
//! - [`metrics`] - Prometheus metrics
//! - [`utils`] - Common utilities and domain errors
//!
//! # Example
//!
//! ```no_run
//! use ann_news::config::Config;
//! use ann_news::server::NewsServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let server = NewsServer::new(&config)?;
//!     server.start_with_shutdown(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod crawler;
pub mod error;
pub mod metrics;
pub mod models;
pub mod parser;
pub mod refresh;
pub mod server;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::SnapshotCache;
    pub use crate::config::Config;
    pub use crate::crawler::{build_fetcher, Fetcher};
    pub use crate::error::{AnnErrorTrait, Error, ErrorCategory, Result};
    pub use crate::models::{ArticleRecord, Snapshot};
    pub use crate::parser::ListingExtractor;
    pub use crate::refresh::{RefreshPolicy, Refresher, Served};
    pub use crate::server::{AppState, NewsServer};
}

// Direct re-exports for convenience
pub use models::{ArticleRecord, Snapshot};
