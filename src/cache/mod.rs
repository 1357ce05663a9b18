//! In-process snapshot cache
//!
//! Holds the single current [`Snapshot`] behind an [`ArcSwap`], so readers
//! never block and never observe a half-written value. A refresh builds a
//! complete snapshot first and then swaps it in whole.
//!
//! # Example
//!
//! ```rust
//! use ann_news::cache::SnapshotCache;
//! use ann_news::models::Snapshot;
//!
//! let cache = SnapshotCache::new();
//! assert!(cache.read().is_empty());
//!
//! cache.replace(Snapshot::new(Vec::new(), chrono::Utc::now()));
//! assert!(cache.read().fetched_at.is_some());
//! ```

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::models::Snapshot;

/// Single-slot store for the latest successful snapshot
#[derive(Debug)]
pub struct SnapshotCache {
    current: ArcSwap<Snapshot>,
}

/// Summary of the cache contents for health output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub records: usize,
    pub fetched_at: Option<DateTime<Utc>>,
    pub age_secs: Option<i64>,
}

impl SnapshotCache {
    /// Create a cache holding the empty, never-fetched snapshot
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::empty()),
        }
    }

    /// Create a cache seeded with `snapshot`
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(snapshot),
        }
    }

    /// Current snapshot
    pub fn read(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Install `snapshot` as the current value
    pub fn replace(&self, snapshot: Snapshot) {
        self.current.store(Arc::new(snapshot));
    }

    /// Record count, production time, and age at `now`
    pub fn status(&self, now: DateTime<Utc>) -> CacheStatus {
        let snapshot = self.current.load();
        CacheStatus {
            records: snapshot.len(),
            fetched_at: snapshot.fetched_at,
            age_secs: snapshot.age(now).map(|age| age.num_seconds()),
        }
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArticleRecord;
    use chrono::TimeZone;

    fn record(n: u32) -> ArticleRecord {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, n, 0).unwrap();
        ArticleRecord::new(
            format!("Title {n}"),
            format!("https://www.animenewsnetwork.com/news/{n}"),
            at,
            "Staff",
        )
    }

    #[test]
    fn test_new_cache_is_empty() {
        let cache = SnapshotCache::new();
        let snapshot = cache.read();
        assert!(snapshot.is_empty());
        assert!(snapshot.fetched_at.is_none());
    }

    #[test]
    fn test_replace_is_whole_value() {
        let cache = SnapshotCache::new();
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 13, 0, 0).unwrap();

        let before = cache.read();
        cache.replace(Snapshot::new(vec![record(1), record(2)], at));
        let after = cache.read();

        // Readers holding the old Arc keep their view
        assert!(before.is_empty());
        assert_eq!(after.len(), 2);
        assert_eq!(after.fetched_at, Some(at));
    }

    #[test]
    fn test_status() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 13, 0, 0).unwrap();
        let cache = SnapshotCache::with_snapshot(Snapshot::new(vec![record(1)], at));

        let status = cache.status(at + chrono::Duration::seconds(90));
        assert_eq!(status.records, 1);
        assert_eq!(status.fetched_at, Some(at));
        assert_eq!(status.age_secs, Some(90));

        let empty = SnapshotCache::new().status(at);
        assert_eq!(empty.records, 0);
        assert_eq!(empty.age_secs, None);
    }
}
