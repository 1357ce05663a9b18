//! Rendered-browser fetch strategy using chromiumoxide.
//!
//! Every fetch launches an isolated headless Chromium, renders the listing,
//! and tears the browser down again. The browser lives inside a
//! [`BrowserSession`] guard so the process is released on success, error,
//! timeout, and cancellation alike.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;
use futures::{Stream, StreamExt};
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::headers::SpoofedHeaders;
use super::Fetcher;
use crate::config::BrowserSettings;
use crate::utils::error::FetchError;

/// Hides the most common automation fingerprints before any page script runs
const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
window.chrome = window.chrome || { runtime: {} };
"#;

/// Interval between checks for the listing container
const SELECTOR_POLL: Duration = Duration::from_millis(250);

/// Upper bound for each teardown step (close, kill, wait)
const TEARDOWN_STEP: Duration = Duration::from_secs(5);

/// Page load state plus the number of resources fetched so far
const QUIET_PROBE: &str =
    "[document.readyState, performance.getEntriesByType('resource').length]";

/// The resource count must hold still this long to count as network idle
const QUIET_WINDOW: Duration = Duration::from_millis(500);

/// Drive the CDP event stream until it ends
///
/// Errors are logged and skipped: the handler reports messages it cannot
/// decode as errors, and stopping here would strand every pending command.
/// Returns the number of errors seen.
async fn drain_events<S, T, E>(mut events: S) -> usize
where
    S: Stream<Item = Result<T, E>> + Unpin,
    E: Display,
{
    let mut errors = 0;
    while let Some(event) = events.next().await {
        if let Err(e) = event {
            errors += 1;
            tracing::trace!(error = %e, "CDP handler event error");
        }
    }
    errors
}

/// Run one teardown step with a deadline; `None` when it timed out
async fn bounded<F: Future>(step: &'static str, limit: Duration, fut: F) -> Option<F::Output> {
    let result = tokio::time::timeout(limit, fut).await.ok();
    if result.is_none() {
        tracing::warn!(step, limit_secs = limit.as_secs(), "Browser teardown step timed out");
    }
    result
}

/// Whether the page counts as settled given two consecutive probes
fn is_quiet(ready_state: &str, previous: Option<u64>, current: u64) -> bool {
    ready_state == "complete" && previous == Some(current)
}

/// Find a Chromium executable.
///
/// Checks the configured path, then `ANN_NEWS_BROWSER_PATH` and
/// `PUPPETEER_EXECUTABLE_PATH`, then the usual binaries on `PATH`.
pub fn find_browser(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        return path.exists().then(|| path.to_path_buf());
    }

    for var in ["ANN_NEWS_BROWSER_PATH", "PUPPETEER_EXECUTABLE_PATH"] {
        if let Ok(p) = std::env::var(var) {
            let path = PathBuf::from(p);
            if path.exists() {
                return Some(path);
            }
        }
    }

    ["google-chrome", "chromium", "chromium-browser"]
        .iter()
        .find_map(|name| which::which(name).ok())
}

/// A launched browser plus its CDP event loop.
///
/// Dropping the session aborts the event loop and drops the `Browser`, which
/// kills the child process. [`close`](Self::close) is the graceful path.
struct BrowserSession {
    browser: Option<Browser>,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    async fn launch(executable: &Path, timeout: Duration) -> Result<Self, FetchError> {
        let config = BrowserConfig::builder()
            .chrome_executable(executable)
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-extensions")
            .arg("--disable-blink-features=AutomationControlled")
            .build()
            .map_err(|e| FetchError::Browser(format!("failed to build browser config: {e}")))?;

        let (browser, handler) = tokio::time::timeout(timeout, Browser::launch(config))
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(|e| FetchError::Browser(format!("failed to launch browser: {e}")))?;

        let handler = tokio::spawn(async move {
            let errors = drain_events(handler).await;
            tracing::debug!(errors, "CDP event loop finished");
        });

        Ok(Self {
            browser: Some(browser),
            handler,
        })
    }

    fn browser(&self) -> Result<&Browser, FetchError> {
        self.browser
            .as_ref()
            .ok_or_else(|| FetchError::Browser(String::from("browser already closed")))
    }

    /// Close gracefully, falling back to killing the process
    ///
    /// Every step is bounded, so teardown finishes even when the browser
    /// or its event loop is wedged.
    async fn close(mut self) {
        if let Some(mut browser) = self.browser.take() {
            let closed = matches!(
                bounded("close", TEARDOWN_STEP, browser.close()).await,
                Some(Ok(_))
            );
            let exited = closed && bounded("wait", TEARDOWN_STEP, browser.wait()).await.is_some();

            if !exited {
                tracing::debug!("Browser did not exit cleanly, killing process");
                let _ = bounded("kill", TEARDOWN_STEP, browser.kill()).await;
            }
        }
        self.handler.abort();
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
        if self.browser.is_some() {
            tracing::debug!("Browser session dropped before close");
        }
    }
}

/// Listing fetcher that renders the page in headless Chromium
pub struct BrowserFetcher {
    executable: PathBuf,
    url: String,
    container_selector: String,
    headers: SpoofedHeaders,
    settings: BrowserSettings,
}

impl BrowserFetcher {
    pub fn new(
        executable: PathBuf,
        url: impl Into<String>,
        container_selector: impl Into<String>,
        headers: SpoofedHeaders,
        settings: BrowserSettings,
    ) -> Self {
        Self {
            executable,
            url: url.into(),
            container_selector: container_selector.into(),
            headers,
            settings,
        }
    }

    /// Total budget for one render, covering every bounded step
    fn render_budget(&self) -> Duration {
        Duration::from_secs(
            self.settings.navigation_timeout_secs + self.settings.selector_timeout_secs,
        ) + Duration::from_millis(self.settings.max_delay_ms)
            + Duration::from_secs(5)
    }

    async fn render(&self, browser: &Browser) -> Result<String, FetchError> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::Browser(format!("failed to open page: {e}")))?;

        let result = self.render_page(&page).await;

        if let Err(e) = page.close().await {
            tracing::debug!(error = %e, "Failed to close page");
        }

        result
    }

    async fn render_page(&self, page: &Page) -> Result<String, FetchError> {
        let user_agent = self.headers.pick_user_agent();
        let ua_override = SetUserAgentOverrideParams::builder()
            .user_agent(user_agent)
            .accept_language(self.headers.accept_language.clone())
            .build()
            .map_err(FetchError::Browser)?;
        page.execute(ua_override).await.map_err(cdp_error)?;

        let extra: serde_json::Map<String, serde_json::Value> = self
            .headers
            .navigation_headers()
            .into_iter()
            .map(|(name, value)| (name.to_string(), serde_json::Value::String(value)))
            .collect();
        page.execute(SetExtraHttpHeadersParams::new(Headers::new(
            serde_json::Value::Object(extra),
        )))
        .await
        .map_err(cdp_error)?;

        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_SCRIPT))
            .await
            .map_err(cdp_error)?;

        let navigation = Duration::from_secs(self.settings.navigation_timeout_secs);
        tokio::time::timeout(navigation, async {
            page.goto(self.url.as_str()).await?;
            page.wait_for_navigation().await?;
            wait_for_quiet(page).await
        })
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(cdp_error)?;

        self.wait_for_container(page).await?;

        let delay = self.human_delay();
        tracing::debug!(delay_ms = delay.as_millis() as u64, "Pausing before capture");
        tokio::time::sleep(delay).await;

        page.content().await.map_err(cdp_error)
    }

    async fn wait_for_container(&self, page: &Page) -> Result<(), FetchError> {
        let wait = Duration::from_secs(self.settings.selector_timeout_secs);
        let selector = self.container_selector.as_str();

        tokio::time::timeout(wait, async {
            loop {
                if page.find_element(selector).await.is_ok() {
                    return;
                }
                tokio::time::sleep(SELECTOR_POLL).await;
            }
        })
        .await
        .map_err(|_| FetchError::SelectorTimeout(selector.to_string()))
    }

    fn human_delay(&self) -> Duration {
        let (min, max) = (self.settings.min_delay_ms, self.settings.max_delay_ms);
        let ms = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        Duration::from_millis(ms)
    }
}

#[async_trait]
impl Fetcher for BrowserFetcher {
    async fn fetch(&self) -> Result<String, FetchError> {
        tracing::debug!(url = %self.url, executable = %self.executable.display(), "Rendering listing");

        let launch = Duration::from_secs(self.settings.launch_timeout_secs);
        let session = BrowserSession::launch(&self.executable, launch).await?;

        let rendered = match session.browser() {
            Ok(browser) => tokio::time::timeout(self.render_budget(), self.render(browser))
                .await
                .unwrap_or(Err(FetchError::Timeout)),
            Err(e) => Err(e),
        };

        session.close().await;
        rendered
    }

    fn name(&self) -> &'static str {
        "browser"
    }
}

/// Wait until the document is complete and no new resources load for a window
///
/// The load event fires before late XHR-driven content settles; the caller
/// bounds this with the navigation timeout.
async fn wait_for_quiet(page: &Page) -> Result<(), chromiumoxide::error::CdpError> {
    let mut previous = None;
    loop {
        let (ready_state, resources): (String, u64) =
            page.evaluate(QUIET_PROBE).await?.into_value()?;
        if is_quiet(&ready_state, previous, resources) {
            return Ok(());
        }
        previous = Some(resources);
        tokio::time::sleep(QUIET_WINDOW).await;
    }
}

fn cdp_error(err: chromiumoxide::error::CdpError) -> FetchError {
    FetchError::Browser(err.to_string())
}
