//! Configuration management for the ann-news service
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then environment variable overrides. The selector set lives here because it
//! is the part that needs editing when the upstream layout drifts.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Allowed TTL band outside development mode (30 to 60 minutes)
pub const MIN_TTL_SECS: u64 = 30 * 60;
pub const MAX_TTL_SECS: u64 = 60 * 60;

/// Longest TTL accepted in development mode
pub const MAX_DEV_TTL_SECS: u64 = 24 * 60 * 60;

/// Upper bound for any single network timeout
pub const MAX_TIMEOUT_SECS: u64 = 60;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upstream site
    pub source: SourceConfig,

    /// Fetch strategy configuration
    pub fetcher: FetcherConfig,

    /// Selector set and extraction limits
    pub extractor: ExtractorConfig,

    /// Snapshot cache policy
    pub cache: CacheConfig,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Upstream site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Site origin used to resolve relative links
    pub base_url: String,

    /// Path of the news listing page
    pub listing_path: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("https://www.animenewsnetwork.com"),
            listing_path: String::from("/news/"),
        }
    }
}

/// Which fetch strategy to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Browser when one is available, otherwise direct
    #[default]
    Auto,
    /// Plain HTTP request with spoofed headers
    Direct,
    /// Headless browser rendering
    Browser,
}

impl std::str::FromStr for StrategyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "direct" | "http" => Ok(Self::Direct),
            "browser" | "chromium" => Ok(Self::Browser),
            other => anyhow::bail!("unknown fetch strategy: {other}"),
        }
    }
}

/// Fetcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Strategy selection, resolved once at startup
    pub strategy: StrategyKind,

    /// Request timeout in seconds for the direct strategy
    pub request_timeout_secs: u64,

    /// Fixed user agent; a browser-like one is rotated when unset
    pub user_agent: Option<String>,

    /// Accept-Language header value
    pub accept_language: String,

    /// Referer header value
    pub referer: String,

    /// Rendered-browser settings
    pub browser: BrowserSettings,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Auto,
            request_timeout_secs: 15,
            user_agent: None,
            accept_language: String::from("en-US,en;q=0.9"),
            referer: String::from("https://www.google.com/"),
            browser: BrowserSettings::default(),
        }
    }
}

/// Rendered-browser settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Chromium executable; discovered from the environment when unset
    pub executable_path: Option<PathBuf>,

    /// Browser launch timeout in seconds
    pub launch_timeout_secs: u64,

    /// Page navigation timeout in seconds
    pub navigation_timeout_secs: u64,

    /// How long to wait for the listing container to render
    pub selector_timeout_secs: u64,

    /// Lower bound of the randomized post-render delay
    pub min_delay_ms: u64,

    /// Upper bound of the randomized post-render delay
    pub max_delay_ms: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable_path: None,
            launch_timeout_secs: 20,
            navigation_timeout_secs: 30,
            selector_timeout_secs: 10,
            min_delay_ms: 2000,
            max_delay_ms: 5000,
        }
    }
}

/// Selector set for the listing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Repeated news item block
    pub container: String,

    /// Title text inside a block
    pub title: String,

    /// Anchor carrying the article link
    pub link: String,

    /// Element carrying the publication date
    pub date: String,

    /// Attribute holding the machine-readable date
    pub date_attribute: String,

    /// Author text inside a block
    pub author: String,

    /// Author used when the block has none
    pub fallback_author: String,

    /// Maximum records kept per snapshot
    pub max_items: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            container: String::from(".herald.box.news"),
            title: String::from("div.header h3 a"),
            link: String::from("div.header a"),
            date: String::from("time"),
            date_attribute: String::from("datetime"),
            author: String::from("div.byline span.editor"),
            fallback_author: String::from("ANN Staff"),
            max_items: 10,
        }
    }
}

/// Snapshot cache policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Snapshot time-to-live in seconds
    pub ttl_secs: u64,

    /// Pause after a failed refresh before contacting upstream again
    pub failure_cooldown_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            failure_cooldown_secs: 60,
        }
    }
}

/// Operating mode, controls error detail exposure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Development,
    #[default]
    Production,
}

impl RunMode {
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl std::str::FromStr for RunMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => anyhow::bail!("unknown run mode: {other}"),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_address: SocketAddr,

    /// Enable permissive CORS
    pub enable_cors: bool,

    /// Enable request logging
    pub enable_request_logging: bool,

    /// Development or production
    pub mode: RunMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            enable_cors: true,
            enable_request_logging: true,
            mode: RunMode::Production,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Config {
    /// Load configuration: defaults, then the optional file, then environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from defaults and environment variables
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ANN_NEWS_TTL_SECS") {
            self.cache.ttl_secs = v
                .parse()
                .with_context(|| format!("ANN_NEWS_TTL_SECS is not a number: {v}"))?;
        }

        if let Some(v) = lookup("ANN_NEWS_REQUEST_TIMEOUT") {
            self.fetcher.request_timeout_secs = v
                .parse()
                .with_context(|| format!("ANN_NEWS_REQUEST_TIMEOUT is not a number: {v}"))?;
        }

        if let Some(v) = lookup("ANN_NEWS_STRATEGY") {
            self.fetcher.strategy = v.parse()?;
        }

        if let Some(v) = lookup("ANN_NEWS_BROWSER_PATH") {
            self.fetcher.browser.executable_path = Some(PathBuf::from(v));
        }

        if let Some(v) = lookup("ANN_NEWS_BIND") {
            self.server.bind_address = v
                .parse()
                .with_context(|| format!("ANN_NEWS_BIND is not a socket address: {v}"))?;
        }

        // NODE_ENV is accepted when ANN_NEWS_MODE is unset
        if let Some(v) = lookup("ANN_NEWS_MODE").or_else(|| lookup("NODE_ENV")) {
            self.server.mode = v.parse()?;
        }

        if let Some(v) = lookup("ANN_NEWS_LOG_LEVEL") {
            self.logging.level = v;
        }

        if let Some(v) = lookup("ANN_NEWS_LOG_FORMAT") {
            self.logging.format = v;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let base = Url::parse(&self.source.base_url)
            .with_context(|| format!("base_url is not a valid URL: {}", self.source.base_url))?;
        if !matches!(base.scheme(), "http" | "https") {
            anyhow::bail!("base_url must be http or https");
        }

        if self.fetcher.request_timeout_secs == 0
            || self.fetcher.request_timeout_secs > MAX_TIMEOUT_SECS
        {
            anyhow::bail!("request_timeout_secs must be between 1 and {MAX_TIMEOUT_SECS}");
        }

        let browser = &self.fetcher.browser;
        for (name, secs) in [
            ("launch_timeout_secs", browser.launch_timeout_secs),
            ("navigation_timeout_secs", browser.navigation_timeout_secs),
            ("selector_timeout_secs", browser.selector_timeout_secs),
        ] {
            if secs == 0 || secs > MAX_TIMEOUT_SECS {
                anyhow::bail!("{name} must be between 1 and {MAX_TIMEOUT_SECS}");
            }
        }

        if browser.min_delay_ms > browser.max_delay_ms {
            anyhow::bail!("min_delay_ms must not exceed max_delay_ms");
        }

        let extractor = &self.extractor;
        for (name, selector) in [
            ("container", &extractor.container),
            ("title", &extractor.title),
            ("link", &extractor.link),
            ("date", &extractor.date),
            ("author", &extractor.author),
        ] {
            if selector.trim().is_empty() {
                anyhow::bail!("{name} selector must not be empty");
            }
        }

        if extractor.max_items == 0 {
            anyhow::bail!("max_items must be greater than 0");
        }

        if self.cache.ttl_secs == 0 || self.cache.ttl_secs > MAX_DEV_TTL_SECS {
            anyhow::bail!("ttl_secs must be between 1 and {MAX_DEV_TTL_SECS}");
        }

        if self.cache.failure_cooldown_secs == 0
            || self.cache.failure_cooldown_secs > self.cache.ttl_secs
        {
            anyhow::bail!("failure_cooldown_secs must be between 1 and ttl_secs");
        }

        if !self.server.mode.is_development()
            && !(MIN_TTL_SECS..=MAX_TTL_SECS).contains(&self.cache.ttl_secs)
        {
            anyhow::bail!(
                "ttl_secs must be between {MIN_TTL_SECS} and {MAX_TTL_SECS} outside development mode"
            );
        }

        Ok(())
    }

    /// Full URL of the listing page
    pub fn listing_url(&self) -> Result<Url> {
        let base = Url::parse(&self.source.base_url)
            .with_context(|| format!("base_url is not a valid URL: {}", self.source.base_url))?;
        base.join(&self.source.listing_path)
            .with_context(|| format!("invalid listing_path: {}", self.source.listing_path))
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.fetcher.request_timeout_secs)
    }

    /// Get snapshot TTL as a chrono Duration
    #[must_use]
    pub fn ttl(&self) -> chrono::Duration {
        seconds(self.cache.ttl_secs)
    }

    /// Get failure cooldown as a chrono Duration
    #[must_use]
    pub fn failure_cooldown(&self) -> chrono::Duration {
        seconds(self.cache.failure_cooldown_secs)
    }
}

/// Saturating seconds-to-`chrono::Duration` conversion for unvalidated configs
fn seconds(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_request_timeout_conversion() {
        let config = Config::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.ttl(), chrono::Duration::minutes(60));
    }

    #[test]
    fn test_listing_url() {
        let config = Config::default();
        assert_eq!(
            config.listing_url().unwrap().as_str(),
            "https://www.animenewsnetwork.com/news/"
        );
    }

    #[test]
    fn test_ttl_band_enforced_in_production() {
        let mut config = Config::default();
        config.cache.ttl_secs = 60;
        assert!(config.validate().is_err());

        config.server.mode = RunMode::Development;
        assert!(config.validate().is_ok());

        config.cache.ttl_secs = 0;
        assert!(config.validate().is_err());

        config.cache.ttl_secs = MAX_DEV_TTL_SECS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_failure_cooldown_bounds() {
        let mut config = Config::default();
        config.cache.failure_cooldown_secs = 0;
        assert!(config.validate().is_err());

        config.cache.failure_cooldown_secs = config.cache.ttl_secs;
        assert!(config.validate().is_ok());

        config.cache.failure_cooldown_secs = config.cache.ttl_secs + 1;
        assert!(config.validate().is_err());

        config.cache.failure_cooldown_secs = u64::MAX / 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_conversion_saturates() {
        let mut config = Config::default();
        config.cache.ttl_secs = u64::MAX;
        config.cache.failure_cooldown_secs = u64::MAX / 2;

        // Unvalidated values must not panic on conversion
        assert_eq!(config.ttl(), chrono::Duration::MAX);
        assert_eq!(config.failure_cooldown(), chrono::Duration::MAX);
    }

    #[test]
    fn test_invalid_timeouts() {
        let mut config = Config::default();
        config.fetcher.request_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fetcher.browser.navigation_timeout_secs = 600;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_delay_range() {
        let mut config = Config::default();
        config.fetcher.browser.min_delay_ms = 6000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_selector_rejected() {
        let mut config = Config::default();
        config.extractor.title = String::from("  ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("ANN_NEWS_TTL_SECS", "1800"),
            ("ANN_NEWS_STRATEGY", "direct"),
            ("ANN_NEWS_BIND", "127.0.0.1:9000"),
            ("NODE_ENV", "development"),
        ]);

        let mut config = Config::default();
        config
            .apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.cache.ttl_secs, 1800);
        assert_eq!(config.fetcher.strategy, StrategyKind::Direct);
        assert_eq!(config.server.bind_address.port(), 9000);
        assert!(config.server.mode.is_development());
    }

    #[test]
    fn test_bad_override_is_an_error() {
        let mut config = Config::default();
        let result = config.apply_overrides_from(|key| {
            (key == "ANN_NEWS_STRATEGY").then(|| String::from("carrier-pigeon"))
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [cache]
            ttl_secs = 1800

            [extractor]
            container = "div.news-item"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.ttl_secs, 1800);
        assert_eq!(config.cache.failure_cooldown_secs, 60);
        assert_eq!(config.extractor.container, "div.news-item");
        assert_eq!(config.extractor.max_items, 10);
        assert_eq!(config.fetcher.strategy, StrategyKind::Auto);
    }
}
