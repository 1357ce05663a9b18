//! Direct HTTP fetch strategy
//!
//! Issues a single GET for the listing page with browser-like headers and a
//! bounded timeout. There is no retry loop here: a failed fetch is retried on
//! the next natural refresh cycle, never inside the same request.

use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use reqwest::{header::CONTENT_TYPE, Client, Response};
use std::time::Duration;

use super::headers::SpoofedHeaders;
use super::Fetcher;
use crate::utils::error::FetchError;

/// Listing fetcher backed by a plain HTTP client
pub struct DirectFetcher {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Listing page URL
    url: String,

    /// Spoofed browser identity
    headers: SpoofedHeaders,
}

impl DirectFetcher {
    /// Create a fetcher for `url`
    ///
    /// # Errors
    ///
    /// Returns `FetchError::InvalidUrl` for a non-absolute URL and
    /// `FetchError::Http` if the HTTP client cannot be created.
    pub fn new(
        url: impl Into<String>,
        headers: SpoofedHeaders,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let url = url.into();
        url::Url::parse(&url).map_err(|_| FetchError::InvalidUrl(url.clone()))?;

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            url,
            headers,
        })
    }

    /// Listing URL this fetcher requests
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the listing page once
    ///
    /// # Errors
    ///
    /// - `FetchError::Timeout` when the request exceeds the client timeout
    /// - `FetchError::Status` for any non-2xx response
    /// - `FetchError::Http` for other transport failures
    pub async fn fetch_listing(&self) -> Result<String, FetchError> {
        let user_agent = self.headers.pick_user_agent();
        let headers = self.headers.header_map(&user_agent);

        tracing::debug!(url = %self.url, user_agent = %user_agent, "Fetching listing");

        let response = self
            .client
            .get(&self.url)
            .headers(headers)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %self.url, status = status.as_u16(), "Upstream returned error status");
            return Err(FetchError::Status(status.as_u16()));
        }

        self.decode_response(response).await
    }

    /// Decode the response body using its declared charset
    async fn decode_response(&self, response: Response) -> Result<String, FetchError> {
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_default();

        let bytes = response.bytes().await.map_err(FetchError::from_reqwest)?;

        Ok(decode_bytes(&bytes, &content_type))
    }
}

#[async_trait]
impl Fetcher for DirectFetcher {
    async fn fetch(&self) -> Result<String, FetchError> {
        self.fetch_listing().await
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}

/// Decode bytes to a string using the charset named in `content_type`
///
/// Falls back to UTF-8 when no charset is declared or the label is unknown.
/// A byte order mark overrides the declared charset. Malformed sequences are
/// replaced rather than failing the fetch.
pub fn decode_bytes(bytes: &[u8], content_type: &str) -> String {
    let encoding = charset_label(content_type)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);

    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::warn!(encoding = used.name(), "Listing body contained malformed sequences");
    }

    text.into_owned()
}

/// Extract the charset parameter from a Content-Type value
fn charset_label(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_string())
    })
}
