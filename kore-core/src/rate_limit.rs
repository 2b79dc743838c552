//! Per-user repeat-query limiter.
//!
//! One counter per `(user, query)` fingerprint with a rolling window. When
//! the window has elapsed the counter restarts at 1; otherwise it increments
//! and the call is allowed only while the count stays within the limit.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::types::Fingerprint;

/// Counter state for one fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindowCounter {
    /// Identical queries seen in the current window.
    pub count: u32,
    /// When the current window opened.
    pub window_start: DateTime<Utc>,
}

/// Thread-safe repeat-query limiter.
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    counters: DashMap<Fingerprint, RateWindowCounter>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter allowing `limit` identical queries per `window`.
    /// A limit of zero disables limiting.
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        Self::with_clock(limit, window, Arc::new(SystemClock))
    }

    /// Create a limiter reading time from `clock`.
    #[must_use]
    pub fn with_clock(limit: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            limit,
            window,
            counters: DashMap::new(),
            clock,
        }
    }

    /// Whether limiting is active.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.limit > 0
    }

    /// Configured limit.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Count this query and report whether it may reach a provider.
    pub fn check_and_increment(&self, user: &str, query: &str) -> bool {
        self.check_fingerprint(&Fingerprint::new(user, query))
    }

    /// Count by a precomputed fingerprint.
    ///
    /// The read-modify-write happens under the entry's shard lock, so two
    /// concurrent identical queries cannot both slip past the limit.
    pub fn check_fingerprint(&self, fingerprint: &Fingerprint) -> bool {
        if !self.is_enabled() {
            return true;
        }
        let now = self.clock.now();
        let mut counter = self
            .counters
            .entry(fingerprint.clone())
            .or_insert(RateWindowCounter {
                count: 0,
                window_start: now,
            });

        if now - counter.window_start >= self.window {
            counter.count = 1;
            counter.window_start = now;
        } else {
            counter.count = counter.count.saturating_add(1);
        }

        let allowed = counter.count <= self.limit;
        if !allowed {
            debug!(key = %fingerprint, count = counter.count, limit = self.limit, "rate limit exceeded");
        }
        allowed
    }

    /// Current counter for a fingerprint, if one exists.
    #[must_use]
    pub fn counter(&self, fingerprint: &Fingerprint) -> Option<RateWindowCounter> {
        self.counters.get(fingerprint).map(|c| *c)
    }

    /// Drop counters whose window has elapsed. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.counters.len();
        self.counters.retain(|_, c| now - c.window_start < self.window);
        before.saturating_sub(self.counters.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter(limit: u32, window_secs: i64) -> (RateLimiter, ManualClock) {
        let clock = ManualClock::new();
        let limiter =
            RateLimiter::with_clock(limit, Duration::seconds(window_secs), Arc::new(clock.clone()));
        (limiter, clock)
    }

    #[test]
    fn allows_up_to_limit_then_blocks() {
        let (limiter, _) = limiter(3, 60);
        assert!(limiter.check_and_increment("alice", "Q"));
        assert!(limiter.check_and_increment("alice", "Q"));
        assert!(limiter.check_and_increment("alice", "Q"));
        assert!(!limiter.check_and_increment("alice", "Q"));
        assert!(!limiter.check_and_increment("alice", "Q"));
    }

    #[test]
    fn window_elapse_resets_count() {
        let (limiter, clock) = limiter(1, 60);
        assert!(limiter.check_and_increment("alice", "Q"));
        assert!(!limiter.check_and_increment("alice", "Q"));
        clock.advance(Duration::seconds(60));
        assert!(limiter.check_and_increment("alice", "Q"));
        let counter = limiter.counter(&Fingerprint::new("alice", "Q")).expect("counter exists");
        assert_eq!(counter.count, 1);
    }

    #[test]
    fn counters_are_per_user_and_query() {
        let (limiter, _) = limiter(1, 60);
        assert!(limiter.check_and_increment("alice", "Q"));
        assert!(limiter.check_and_increment("bob", "Q"));
        assert!(limiter.check_and_increment("alice", "other"));
        assert!(!limiter.check_and_increment("alice", "  q "));
    }

    #[test]
    fn zero_limit_always_allows() {
        let (limiter, _) = limiter(0, 60);
        for _ in 0..10 {
            assert!(limiter.check_and_increment("alice", "Q"));
        }
        assert!(limiter.counter(&Fingerprint::new("alice", "Q")).is_none());
    }

    #[test]
    fn concurrent_identical_queries_respect_limit() {
        let (limiter, _) = limiter(5, 60);
        let limiter = Arc::new(limiter);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || {
                    (0..25).filter(|_| limiter.check_and_increment("alice", "Q")).count()
                })
            })
            .collect();
        let allowed: usize = handles.into_iter().map(|h| h.join().expect("thread")).sum();
        assert_eq!(allowed, 5);
    }

    #[test]
    fn purge_drops_stale_counters() {
        let (limiter, clock) = limiter(2, 10);
        limiter.check_and_increment("alice", "Q");
        clock.advance(Duration::seconds(11));
        limiter.check_and_increment("bob", "Q");
        assert_eq!(limiter.purge_expired(), 1);
        assert!(limiter.counter(&Fingerprint::new("bob", "Q")).is_some());
    }
}
