//! Runtime counters for bridge operations.
//!
//! Lock-free `AtomicU64` counters bumped on the hot path and read on export,
//! with a Prometheus text rendering for dashboards.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters for bridge events.
#[derive(Debug)]
pub struct BridgeCounters {
    /// `think` calls received.
    pub think_calls: AtomicU64,
    /// Answers served from the response cache.
    pub cache_hits: AtomicU64,
    /// Cache lookups that found nothing.
    pub cache_misses: AtomicU64,
    /// Calls redirected by the rate limiter.
    pub rate_limited: AtomicU64,
    /// Rate-limited calls answered from cache, memory or refusal text.
    pub fallback_answers: AtomicU64,
    /// Provider invocations.
    pub provider_calls: AtomicU64,
    /// Provider invocations that failed.
    pub provider_failures: AtomicU64,
    /// Facts stored through `observe`.
    pub observations: AtomicU64,
    /// `reflect` calls completed.
    pub reflections: AtomicU64,
}

impl BridgeCounters {
    /// Create a new set of zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            think_calls: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            fallback_answers: AtomicU64::new(0),
            provider_calls: AtomicU64::new(0),
            provider_failures: AtomicU64::new(0),
            observations: AtomicU64::new(0),
            reflections: AtomicU64::new(0),
        }
    }

    /// Increment one counter.
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot all counters for export.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            think_calls: self.think_calls.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            fallback_answers: self.fallback_answers.load(Ordering::Relaxed),
            provider_calls: self.provider_calls.load(Ordering::Relaxed),
            provider_failures: self.provider_failures.load(Ordering::Relaxed),
            observations: self.observations.load(Ordering::Relaxed),
            reflections: self.reflections.load(Ordering::Relaxed),
        }
    }
}

impl Default for BridgeCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter values at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// `think` calls received.
    pub think_calls: u64,
    /// Cache hits.
    pub cache_hits: u64,
    /// Cache misses.
    pub cache_misses: u64,
    /// Rate-limited calls.
    pub rate_limited: u64,
    /// Fallback answers served.
    pub fallback_answers: u64,
    /// Provider invocations.
    pub provider_calls: u64,
    /// Failed provider invocations.
    pub provider_failures: u64,
    /// Stored observations.
    pub observations: u64,
    /// Completed reflections.
    pub reflections: u64,
}

impl CounterSnapshot {
    /// Fraction of cache lookups that hit, or 0.0 before any lookup.
    #[must_use]
    pub fn cache_hit_ratio(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }

    /// Format as Prometheus-compatible text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let rows: [(&str, &str, u64); 9] = [
            ("kore_think_calls_total", "think calls received", self.think_calls),
            ("kore_cache_hits_total", "Answers served from cache", self.cache_hits),
            ("kore_cache_misses_total", "Cache lookups without a valid entry", self.cache_misses),
            ("kore_rate_limited_total", "Calls redirected by the rate limiter", self.rate_limited),
            ("kore_fallback_answers_total", "Rate-limited calls answered without a provider", self.fallback_answers),
            ("kore_provider_calls_total", "Provider invocations", self.provider_calls),
            ("kore_provider_failures_total", "Failed provider invocations", self.provider_failures),
            ("kore_observations_total", "Facts stored through observe", self.observations),
            ("kore_reflections_total", "Completed reflections", self.reflections),
        ];
        let mut out = String::new();
        for (name, help, value) in rows {
            out.push_str(&format!("# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n"));
        }
        out
    }
}
