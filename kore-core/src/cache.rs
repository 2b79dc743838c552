//! Response cache with per-entry TTL.
//!
//! Keys are [`Fingerprint`]s, so a cached answer for one user is never
//! served to another. Expired entries are treated as absent on read and only
//! dropped by [`ResponseCache::purge_expired`] or an overwrite.
//!
//! Storage is a sharded [`DashMap`]: each key is read and written under its
//! shard lock, so concurrent callers on different keys never contend on a
//! single global lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::types::Fingerprint;

/// A single cached response.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Key the entry is stored under.
    pub fingerprint: Fingerprint,
    /// The provider response text.
    pub response: String,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
    /// How long the entry stays valid.
    pub ttl: Duration,
}

impl CacheEntry {
    /// An entry is valid iff `now - created_at < ttl`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at < self.ttl
    }
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently stored, expired ones included.
    pub entries: usize,
    /// Lookups that returned a response.
    pub hits: u64,
    /// Lookups that found nothing valid.
    pub misses: u64,
}

/// Thread-safe response cache.
pub struct ResponseCache {
    entries: DashMap<Fingerprint, CacheEntry>,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    /// Create an empty cache on the wall clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty cache reading time from `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up the response for `(user, query)` if present and not expired.
    pub fn get(&self, user: &str, query: &str) -> Option<String> {
        self.get_fingerprint(&Fingerprint::new(user, query))
    }

    /// Look up by a precomputed fingerprint.
    pub fn get_fingerprint(&self, fingerprint: &Fingerprint) -> Option<String> {
        let now = self.clock.now();
        let found = self
            .entries
            .get(fingerprint)
            .filter(|entry| entry.is_valid_at(now))
            .map(|entry| entry.response.clone());

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %fingerprint, "cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(key = %fingerprint, "cache miss");
        }
        found
    }

    /// Store or overwrite the entry for `(user, query)`.
    ///
    /// A zero or negative `ttl` disables caching for this entry; returns
    /// whether anything was written.
    pub fn put(&self, user: &str, query: &str, response: impl Into<String>, ttl: Duration) -> bool {
        self.put_fingerprint(Fingerprint::new(user, query), response, ttl)
    }

    /// Store by a precomputed fingerprint.
    pub fn put_fingerprint(
        &self,
        fingerprint: Fingerprint,
        response: impl Into<String>,
        ttl: Duration,
    ) -> bool {
        if ttl <= Duration::zero() {
            return false;
        }
        let entry = CacheEntry {
            fingerprint: fingerprint.clone(),
            response: response.into(),
            created_at: self.clock.now(),
            ttl,
        };
        self.entries.insert(fingerprint, entry);
        true
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_valid_at(now));
        before.saturating_sub(self.entries.len())
    }

    /// Remove everything.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}
