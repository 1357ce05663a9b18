//! Refresh coordination
//!
//! [`Refresher`] decides, per request, whether the cached snapshot can be
//! served as is, and otherwise runs one fetch + extract for everyone waiting.
//!
//! # Single flight
//!
//! Stale readers queue on an owned async mutex. The first one through spawns
//! the refresh task and hands it the guard, so the gate stays held until the
//! refresh settles even if that client disconnects. Later readers re-check the
//! cache after acquiring the gate and find either the new snapshot or the
//! outcome of the attempt that ran while they queued, so N concurrent stale
//! requests cost one upstream fetch regardless of the failure cooldown.
//!
//! # Failures
//!
//! A failed refresh never touches the cache. The failure is remembered for
//! `failure_cooldown`; during that window stale reads are answered degraded
//! without contacting upstream.

pub mod policy;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::cache::SnapshotCache;
use crate::crawler::Fetcher;
use crate::error::{AnnErrorTrait, Error, Result};
use crate::metrics;
use crate::models::{ArticleRecord, Snapshot};
use crate::parser::ListingExtractor;
use crate::utils::error::RefreshError;

pub use policy::{cooldown_remaining, should_refresh, RefreshPolicy};

/// Outcome of a read through the refresher
#[derive(Debug, Clone)]
pub enum Served {
    /// Snapshot within its TTL, or just refreshed
    Fresh(Arc<Snapshot>),

    /// Refresh failed or is cooling down; `snapshot` is the last good one
    Degraded {
        snapshot: Arc<Snapshot>,
        reason: String,
        retry_after: Duration,
    },
}

impl Served {
    pub fn snapshot(&self) -> &Arc<Snapshot> {
        match self {
            Self::Fresh(snapshot) | Self::Degraded { snapshot, .. } => snapshot,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }
}

/// Most recent refresh failure
#[derive(Debug)]
struct Failure {
    at: DateTime<Utc>,
    reason: String,
}

/// Outcome of a settled refresh, tagged with its attempt number
#[derive(Debug)]
struct Attempt {
    number: u64,
    served: Served,
}

/// Coordinates cache reads with on-demand refreshes
#[derive(Clone)]
pub struct Refresher {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<ListingExtractor>,
    cache: Arc<SnapshotCache>,
    policy: RefreshPolicy,
    gate: Arc<Mutex<()>>,
    last_failure: Arc<ArcSwapOption<Failure>>,
    attempts: Arc<AtomicU64>,
    last_attempt: Arc<ArcSwapOption<Attempt>>,
}

impl Refresher {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<ListingExtractor>,
        cache: Arc<SnapshotCache>,
        policy: RefreshPolicy,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            cache,
            policy,
            gate: Arc::new(Mutex::new(())),
            last_failure: Arc::new(ArcSwapOption::empty()),
            attempts: Arc::new(AtomicU64::new(0)),
            last_attempt: Arc::new(ArcSwapOption::empty()),
        }
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    pub fn policy(&self) -> &RefreshPolicy {
        &self.policy
    }

    /// Name of the active fetch strategy
    pub fn strategy(&self) -> &'static str {
        self.fetcher.name()
    }

    /// Serve the current snapshot, refreshing it first when stale
    ///
    /// # Errors
    ///
    /// Only `Error::Internal`, when the refresh task itself dies. Fetch and
    /// extraction failures come back as [`Served::Degraded`].
    pub async fn current(&self) -> Result<Served> {
        if let Some(served) = self.check_cache(Utc::now()) {
            return Ok(served);
        }

        let seen = self.attempts.load(Ordering::Acquire);
        let guard = self.gate.clone().lock_owned().await;

        // Another request may have settled the refresh while we waited
        if let Some(served) = self.check_cache(Utc::now()) {
            metrics::record_coalesced();
            return Ok(served);
        }
        if let Some(served) = self.settled_since(seen) {
            metrics::record_coalesced();
            return Ok(served);
        }

        let this = self.clone();
        let task = tokio::spawn(async move {
            let _guard = guard;
            let served = this.refresh().await;
            this.settle(served.clone());
            served
        });

        task.await.map_err(|e| {
            metrics::record_refresh("panic");
            tracing::error!(error = %e, "Refresh task did not complete");
            Error::internal(format!("refresh task failed: {e}"))
        })
    }

    /// Answer from the cache alone, or `None` when a refresh is due
    fn check_cache(&self, now: DateTime<Utc>) -> Option<Served> {
        let snapshot = self.cache.read();
        if !self.policy.should_refresh(snapshot.fetched_at, now) {
            return Some(Served::Fresh(snapshot));
        }

        let failure = self.last_failure.load_full()?;
        let remaining = self.policy.cooldown_remaining(Some(failure.at), now)?;

        tracing::debug!(
            remaining_secs = remaining.num_seconds(),
            "Snapshot stale, upstream cooling down"
        );

        Some(Served::Degraded {
            snapshot,
            reason: failure.reason.clone(),
            retry_after: self.policy.retry_hint(Some(remaining)),
        })
    }

    /// Outcome of an attempt that finished after `seen`, if any
    fn settled_since(&self, seen: u64) -> Option<Served> {
        let attempt = self.last_attempt.load_full()?;
        (attempt.number > seen).then(|| attempt.served.clone())
    }

    /// Publish a finished attempt; runs while the gate is still held
    fn settle(&self, served: Served) {
        let number = self.attempts.load(Ordering::Acquire) + 1;
        self.last_attempt
            .store(Some(Arc::new(Attempt { number, served })));
        self.attempts.store(number, Ordering::Release);
    }

    /// Run one refresh and install the result
    async fn refresh(&self) -> Served {
        let _timer = metrics::start_refresh_timer();
        tracing::info!(strategy = self.fetcher.name(), "Refreshing news snapshot");

        match self.fetch_records().await {
            Ok(records) => {
                let count = records.len();
                self.cache.replace(Snapshot::new(records, Utc::now()));
                self.last_failure.store(None);

                metrics::record_refresh("success");
                metrics::record_snapshot_size(count);
                tracing::info!(records = count, "News snapshot refreshed");

                Served::Fresh(self.cache.read())
            }
            Err(e) => {
                let snapshot = self.cache.read();
                metrics::record_refresh(e.kind());
                if e.is_recoverable() {
                    tracing::warn!(
                        error = %e,
                        kind = e.kind(),
                        cached = snapshot.len(),
                        "Refresh failed, keeping last snapshot"
                    );
                } else {
                    // Retrying will not help until the upstream or config changes
                    tracing::error!(
                        error = %e,
                        kind = e.kind(),
                        category = e.category().as_str(),
                        cached = snapshot.len(),
                        "Refresh failed permanently, keeping last snapshot"
                    );
                }

                let reason = e.to_string();
                self.last_failure.store(Some(Arc::new(Failure {
                    at: Utc::now(),
                    reason: reason.clone(),
                })));

                Served::Degraded {
                    snapshot,
                    reason,
                    retry_after: self.policy.retry_hint(None),
                }
            }
        }
    }

    /// Fetch and extract once, without touching the cache
    ///
    /// # Errors
    ///
    /// `RefreshError::Fetch` when the markup cannot be obtained and
    /// `RefreshError::Empty` when it yields no records.
    pub async fn fetch_records(&self) -> std::result::Result<Vec<ArticleRecord>, RefreshError> {
        let markup = self.fetcher.fetch().await?;
        let records = self.extractor.extract(&markup);

        if records.is_empty() {
            return Err(RefreshError::Empty);
        }
        Ok(records)
    }
}
