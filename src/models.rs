// Core data structures for the ann-news pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One news item extracted from the listing page
///
/// Serialized as `{title, url, date, author, timestamp}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub title: String,
    pub url: String,
    #[serde(rename = "date")]
    pub published_at: DateTime<Utc>,
    pub author: String,
    /// Epoch milliseconds of `published_at`
    pub timestamp: i64,
    /// Set when `published_at` is the extraction instant rather than the source date
    #[serde(skip)]
    pub date_estimated: bool,
}

impl ArticleRecord {
    /// Build a record, deriving `timestamp` from the publication instant
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        published_at: DateTime<Utc>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            published_at,
            author: author.into(),
            timestamp: published_at.timestamp_millis(),
            date_estimated: false,
        }
    }

    /// Mark the publication date as a fallback
    pub fn with_estimated_date(mut self) -> Self {
        self.date_estimated = true;
        self
    }
}

/// Cached result of the most recent successful refresh
///
/// Snapshots are immutable once built; a refresh replaces the whole value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Records in listing order (newest first on the source)
    pub records: Vec<ArticleRecord>,
    /// When the snapshot was produced; `None` until a refresh has succeeded
    pub fetched_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Empty snapshot used at process start
    pub fn empty() -> Self {
        Self::default()
    }

    /// Snapshot produced by a successful refresh at `fetched_at`
    pub fn new(records: Vec<ArticleRecord>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            records,
            fetched_at: Some(fetched_at),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Age of the snapshot at `now`, if it was ever fetched
    pub fn age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.fetched_at.map(|at| now - at)
    }
}
