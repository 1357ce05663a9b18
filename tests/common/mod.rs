//! Common test utilities

#![allow(dead_code)]

use ann_news::cache::SnapshotCache;
use ann_news::config::ExtractorConfig;
use ann_news::crawler::Fetcher;
use ann_news::models::{ArticleRecord, Snapshot};
use ann_news::parser::ListingExtractor;
use ann_news::refresh::{RefreshPolicy, Refresher};
use ann_news::utils::error::FetchError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const BASE_URL: &str = "https://www.animenewsnetwork.com";

/// One news item block in the listing layout
pub fn news_block(title: &str, href: &str, datetime: Option<&str>, author: Option<&str>) -> String {
    let date = datetime
        .map(|d| format!(r#"<time datetime="{d}">{d}</time>"#))
        .unwrap_or_default();
    let author = author
        .map(|a| format!(r#"<span class="editor">{a}</span>"#))
        .unwrap_or_default();

    format!(
        r#"<div class="herald box news">
             <div class="thumbnail"><a href="{href}"><img src="/thumb.jpg"></a></div>
             <div class="wrap">
               <div class="header"><h3><a href="{href}">{title}</a></h3></div>
               <div class="byline">{date} by {author}</div>
             </div>
           </div>"#
    )
}

/// Full listing page wrapping `blocks`
pub fn listing_page(blocks: &[String]) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>News - Anime News Network</title></head>
<body>
  <div id="mainfeed">{}</div>
</body>
</html>"#,
        blocks.join("\n")
    )
}

/// Listing with `n` well-formed items
pub fn listing_with(n: usize) -> String {
    let blocks: Vec<String> = (1..=n)
        .map(|i| {
            news_block(
                &format!("Headline {i}"),
                &format!("/news/2024-03-01/headline-{i}/.{}", 200_000 + i),
                Some("2024-03-01T12:00:00Z"),
                Some("Staff Writer"),
            )
        })
        .collect();
    listing_page(&blocks)
}

pub fn default_extractor() -> ListingExtractor {
    ListingExtractor::new(&ExtractorConfig::default(), BASE_URL).unwrap()
}

/// Record for seeding the cache
pub fn test_record(n: u32) -> ArticleRecord {
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, n % 60, 0).unwrap();
    ArticleRecord::new(
        format!("Cached headline {n}"),
        format!("{BASE_URL}/news/2024-03-01/cached-{n}"),
        at,
        "ANN Staff",
    )
}

/// Snapshot of `n` records fetched `age` ago
pub fn aged_snapshot(n: u32, age: Duration) -> Snapshot {
    let fetched_at: DateTime<Utc> = Utc::now() - age;
    Snapshot::new((1..=n).map(test_record).collect(), fetched_at)
}

/// Fetcher that counts calls, optionally waits, then returns a fixed result
pub struct CountingFetcher {
    body: Option<String>,
    delay: std::time::Duration,
    calls: AtomicUsize,
}

impl CountingFetcher {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            delay: std::time::Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            body: None,
            delay: std::time::Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for CountingFetcher {
    async fn fetch(&self) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.body.clone().ok_or(FetchError::Timeout)
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

/// Fetcher that panics, for exercising the internal error path
pub struct PanickingFetcher;

#[async_trait]
impl Fetcher for PanickingFetcher {
    async fn fetch(&self) -> Result<String, FetchError> {
        panic!("fetcher exploded");
    }

    fn name(&self) -> &'static str {
        "panicking"
    }
}

/// Refresher over `fetcher` with a pre-seeded cache and the default policy
pub fn refresher_with(fetcher: Arc<dyn Fetcher>, seed: Snapshot) -> Refresher {
    Refresher::new(
        fetcher,
        Arc::new(default_extractor()),
        Arc::new(SnapshotCache::with_snapshot(seed)),
        RefreshPolicy::default(),
    )
}
