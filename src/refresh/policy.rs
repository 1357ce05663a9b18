//! Staleness and failure-cooldown rules
//!
//! Everything here is pure: callers pass the clock in.

use chrono::{DateTime, Duration, Utc};

use crate::config::Config;

/// Smallest retry hint handed to clients
const MIN_RETRY_HINT: std::time::Duration = std::time::Duration::from_secs(1);

/// Whether a snapshot produced at `fetched_at` must be refreshed at `now`
///
/// A snapshot that was never fetched is always stale. The comparison is
/// strict: a snapshot exactly `ttl` old is still fresh.
pub fn should_refresh(fetched_at: Option<DateTime<Utc>>, now: DateTime<Utc>, ttl: Duration) -> bool {
    match fetched_at {
        None => true,
        Some(at) => now - at > ttl,
    }
}

/// Time left before upstream may be contacted again after a failure at `last_failure`
///
/// `None` when there was no failure or the cooldown has elapsed.
pub fn cooldown_remaining(
    last_failure: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> Option<Duration> {
    let until = last_failure?
        .checked_add_signed(cooldown)
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    let remaining = until - now;
    (remaining > Duration::zero()).then_some(remaining)
}

/// TTL plus failure cooldown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    ttl: Duration,
    failure_cooldown: Duration,
}

impl RefreshPolicy {
    pub fn new(ttl: Duration, failure_cooldown: Duration) -> Self {
        Self {
            ttl,
            failure_cooldown,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.ttl(), config.failure_cooldown())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn failure_cooldown(&self) -> Duration {
        self.failure_cooldown
    }

    pub fn should_refresh(&self, fetched_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        should_refresh(fetched_at, now, self.ttl)
    }

    pub fn cooldown_remaining(
        &self,
        last_failure: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<Duration> {
        cooldown_remaining(last_failure, now, self.failure_cooldown)
    }

    /// Retry hint for a degraded response
    ///
    /// Uses the remaining cooldown when known, the full cooldown otherwise,
    /// and never less than one second.
    pub fn retry_hint(&self, remaining: Option<Duration>) -> std::time::Duration {
        remaining
            .unwrap_or(self.failure_cooldown)
            .to_std()
            .unwrap_or(MIN_RETRY_HINT)
            .max(MIN_RETRY_HINT)
    }
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
