//! Unified error handling for the ann-news crate
//!
//! This module provides a unified error type for the request path, while
//! keeping the domain errors available where a module needs the detail.
//!
//! # Architecture
//!
//! - [`AnnErrorTrait`] - Common interface implemented by the error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum returned by the refresher

use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::utils::error::{FetchError, ParseError, RefreshError};

/// Common trait for ann-news error types
pub trait AnnErrorTrait: std::error::Error {
    /// Check if this error is recoverable (a later refresh may succeed)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout, browser)
    Network,
    /// The listing yielded nothing usable
    Parsing,
    /// Faults outside the refresh boundary
    Internal,
}

impl ErrorCategory {
    /// Human-readable category name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Parsing => "parsing",
            Self::Internal => "internal",
        }
    }
}

/// Unified error type for the ann-news crate
#[derive(Error, Debug)]
pub enum Error {
    /// Fetch-specific errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Unexpected fault, e.g. a panicked refresh task
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnnErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            Self::Internal(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(_) => ErrorCategory::Network,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }
}

impl AnnErrorTrait for RefreshError {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            Self::Empty => true,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(_) => ErrorCategory::Network,
            Self::Empty => ErrorCategory::Parsing,
        }
    }
}

impl Error {
    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
