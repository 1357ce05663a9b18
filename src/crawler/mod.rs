//! Fetch strategies for the news listing page
//!
//! Two interchangeable strategies sit behind the [`Fetcher`] trait:
//!
//! - [`fetcher::DirectFetcher`] - one HTTP request with spoofed headers
//! - `browser::BrowserFetcher` - headless Chromium render (`browser` feature)
//!
//! Exactly one is active per process; [`build_fetcher`] picks it at startup.

#[cfg(feature = "browser")]
pub mod browser;
pub mod fetcher;
pub mod headers;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{Config, StrategyKind};
use crate::error::{Error, Result};
use crate::utils::error::FetchError;

pub use fetcher::DirectFetcher;
pub use headers::SpoofedHeaders;

/// Source of raw listing markup
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Obtain the listing page markup
    async fn fetch(&self) -> std::result::Result<String, FetchError>;

    /// Strategy name for logs and health output
    fn name(&self) -> &'static str;
}

/// Build the fetch strategy selected by configuration
///
/// `auto` prefers the rendered browser when the `browser` feature is compiled
/// in and an executable can be found, and falls back to the direct strategy
/// otherwise. An explicit `browser` request that cannot be satisfied is a
/// startup error.
pub fn build_fetcher(config: &Config) -> Result<Arc<dyn Fetcher>> {
    let url = config
        .listing_url()
        .map_err(|e| FetchError::InvalidUrl(e.to_string()))?
        .to_string();
    let headers = SpoofedHeaders::from_config(&config.fetcher);

    let fetcher: Arc<dyn Fetcher> = match config.fetcher.strategy {
        StrategyKind::Direct => Arc::new(DirectFetcher::new(url, headers, config.request_timeout())?),
        StrategyKind::Browser => build_browser(config, url, headers)?,
        StrategyKind::Auto => match build_browser(config, url.clone(), headers.clone()) {
            Ok(fetcher) => fetcher,
            Err(e) => {
                tracing::info!(reason = %e, "Rendered browser unavailable, using direct fetch");
                Arc::new(DirectFetcher::new(url, headers, config.request_timeout())?)
            }
        },
    };

    tracing::info!(strategy = fetcher.name(), "Fetch strategy selected");
    Ok(fetcher)
}

#[cfg(feature = "browser")]
fn build_browser(config: &Config, url: String, headers: SpoofedHeaders) -> Result<Arc<dyn Fetcher>> {
    let settings = &config.fetcher.browser;
    let executable = browser::find_browser(settings.executable_path.as_deref()).ok_or_else(|| {
        Error::Fetch(FetchError::BrowserUnavailable(String::from(
            "no Chromium executable found",
        )))
    })?;

    Ok(Arc::new(browser::BrowserFetcher::new(
        executable,
        url,
        config.extractor.container.clone(),
        headers,
        settings.clone(),
    )))
}

#[cfg(not(feature = "browser"))]
fn build_browser(
    _config: &Config,
    _url: String,
    _headers: SpoofedHeaders,
) -> Result<Arc<dyn Fetcher>> {
    Err(Error::Fetch(FetchError::BrowserUnavailable(String::from(
        "built without the `browser` feature",
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_strategy() {
        let mut config = Config::default();
        config.fetcher.strategy = StrategyKind::Direct;
        let fetcher = build_fetcher(&config).unwrap();
        assert_eq!(fetcher.name(), "direct");
    }

    #[cfg(not(feature = "browser"))]
    #[test]
    fn test_auto_falls_back_to_direct() {
        let config = Config::default();
        let fetcher = build_fetcher(&config).unwrap();
        assert_eq!(fetcher.name(), "direct");
    }

    #[cfg(not(feature = "browser"))]
    #[test]
    fn test_explicit_browser_without_feature_fails() {
        let mut config = Config::default();
        config.fetcher.strategy = StrategyKind::Browser;
        let result = build_fetcher(&config);
        assert!(matches!(
            result,
            Err(Error::Fetch(FetchError::BrowserUnavailable(_)))
        ));
    }

    #[cfg(feature = "browser")]
    #[test]
    fn test_explicit_browser_missing_executable_fails() {
        let mut config = Config::default();
        config.fetcher.strategy = StrategyKind::Browser;
        config.fetcher.browser.executable_path =
            Some(std::path::PathBuf::from("/definitely/not/a/browser"));
        assert!(build_fetcher(&config).is_err());
    }
}
