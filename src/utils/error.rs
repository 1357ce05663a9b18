//! Error types for the fetch-parse-refresh pipeline
//!
//! This module defines the domain errors raised while obtaining and
//! extracting the news listing.

use thiserror::Error;

/// Errors that can occur while obtaining the listing markup
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport-level HTTP failure (connect, TLS, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("Upstream returned status {0}")]
    Status(u16),

    /// A bounded wait elapsed (request, navigation, render)
    #[error("Request timeout")]
    Timeout,

    /// The expected container never appeared in the rendered page
    #[error("Timed out waiting for selector: {0}")]
    SelectorTimeout(String),

    /// Browser automation failure
    #[error("Browser error: {0}")]
    Browser(String),

    /// No usable browser for the rendered strategy
    #[error("Browser unavailable: {0}")]
    BrowserUnavailable(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Classify a reqwest error, keeping timeouts distinct from other transport failures
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }

    /// Whether the next natural refresh cycle may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout | Self::SelectorTimeout(_) | Self::Browser(_) => true,
            Self::Status(code) => matches!(code, 408 | 429 | 500..=599),
            Self::BrowserUnavailable(_) | Self::InvalidUrl(_) => false,
        }
    }
}

/// Errors that can occur while preparing the extractor
#[derive(Error, Debug)]
pub enum ParseError {
    /// A configured CSS selector does not parse
    #[error("Invalid {field} selector: {selector}")]
    InvalidSelector { field: &'static str, selector: String },

    /// Invalid base URL for link resolution
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Errors raised by a single refresh attempt
///
/// These never reach the client directly; the refresher converts them into a
/// degraded response that keeps serving the last good snapshot.
#[derive(Error, Debug)]
pub enum RefreshError {
    /// Markup could not be obtained
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Markup was obtained but no qualifying records were found
    #[error("No articles found in listing")]
    Empty,
}

impl RefreshError {
    /// Short machine-friendly label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch(FetchError::Timeout) | Self::Fetch(FetchError::SelectorTimeout(_)) => {
                "timeout"
            }
            Self::Fetch(FetchError::Status(_)) => "http_status",
            Self::Fetch(_) => "network",
            Self::Empty => "empty",
        }
    }
}
