//! Core type definitions shared by the cache, rate limiter and memory store.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Unique identifier for a stored memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryId(pub Uuid);

impl MemoryId {
    /// Create a new random memory ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MemoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Fingerprints
// ---------------------------------------------------------------------------

/// Number of hex characters kept from the SHA-256 digest of a query.
const QUERY_HASH_LEN: usize = 16;

/// Normalize a query for hashing: trim, lowercase, collapse runs of whitespace.
#[must_use]
pub fn normalize_query(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stable hash of a normalized query: the first 16 hex chars of its SHA-256.
#[must_use]
pub fn query_hash(text: &str) -> String {
    let digest = Sha256::digest(normalize_query(text).as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(QUERY_HASH_LEN);
    hex
}

/// Composite key for cache entries and rate-limit counters.
///
/// The user is kept verbatim next to the query hash, so two users can never
/// collide on the same key even if their query hashes do.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint {
    /// User (or source) identifier.
    pub user: String,
    /// Hash of the normalized query text.
    pub query_hash: String,
}

impl Fingerprint {
    /// Fingerprint a `(user, query)` pair.
    #[must_use]
    pub fn new(user: &str, query: &str) -> Self {
        Self {
            user: user.to_string(),
            query_hash: query_hash(query),
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.user, self.query_hash)
    }
}

// ---------------------------------------------------------------------------
// Memory records
// ---------------------------------------------------------------------------

/// What kind of content a memory record holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemoryKind {
    /// A fact appended through `observe`.
    Observation,
    /// A user query that reached a provider.
    Prompt {
        /// Hash of the normalized query.
        query_hash: String,
    },
    /// A provider answer to a query.
    Response {
        /// Hash of the normalized query this answers.
        query_hash: String,
    },
}

impl MemoryKind {
    /// Short label used when formatting memories for prompts.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Observation => "observation",
            Self::Prompt { .. } => "prompt",
            Self::Response { .. } => "response",
        }
    }
}

/// One entry held by a memory store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique ID.
    pub id: MemoryId,
    /// Owner of the memory.
    pub user: String,
    /// Free text content.
    pub content: String,
    /// Record kind.
    pub kind: MemoryKind,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A synthesized identity summary produced by reflection.
///
/// Returned to the caller as a read-only artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    /// Who the assistant is, in a few sentences.
    pub summary: String,
    /// Personality traits with confidence scores (0.0 to 1.0).
    #[serde(default)]
    pub traits: BTreeMap<String, f32>,
    /// People the assistant interacts with, and how.
    #[serde(default)]
    pub relationships: BTreeMap<String, String>,
    /// User the snapshot was derived for; `None` for a global reflection.
    pub user: Option<String>,
    /// When the snapshot was derived.
    pub derived_at: DateTime<Utc>,
}

impl IdentitySnapshot {
    /// The `n` highest-scoring trait names, best first.
    #[must_use]
    pub fn top_traits(&self, n: usize) -> Vec<&str> {
        let mut traits: Vec<(&String, &f32)> = self.traits.iter().collect();
        traits.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
        traits.into_iter().take(n).map(|(name, _)| name.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// Traces
// ---------------------------------------------------------------------------

/// Maximum characters of input/output kept on a trace.
pub const TRACE_TEXT_LIMIT: usize = 500;

/// Extra detail attached to a trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceMetadata {
    /// Whether the answer came from the response cache.
    pub cache_hit: bool,
    /// Whether the rate limiter redirected the call.
    pub rate_limited: bool,
    /// Number of memories injected into the prompt.
    pub memories_used: usize,
    /// Provider that produced the answer, if one was called.
    pub provider: Option<String>,
}

/// An observability record for one bridge operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Operation name, e.g. `bridge.think`.
    pub operation: String,
    /// User the operation ran for.
    pub user: String,
    /// Truncated input text.
    pub input: String,
    /// Truncated output text.
    pub output: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
    /// Extra detail.
    pub metadata: TraceMetadata,
}

impl Trace {
    /// Build a trace, truncating input and output to [`TRACE_TEXT_LIMIT`] characters.
    #[must_use]
    pub fn new(
        operation: impl Into<String>,
        user: impl Into<String>,
        input: &str,
        output: &str,
        duration_ms: f64,
        metadata: TraceMetadata,
    ) -> Self {
        Self {
            operation: operation.into(),
            user: user.into(),
            input: truncate_chars(input, TRACE_TEXT_LIMIT),
            output: truncate_chars(output, TRACE_TEXT_LIMIT),
            duration_ms,
            metadata,
        }
    }
}

/// Truncate to at most `max` characters without splitting a code point.
#[must_use]
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_collapses_case_and_whitespace() {
        assert_eq!(normalize_query("  What IS\tP  vs\nNP?  "), "what is p vs np?");
    }

    #[test]
    fn equivalent_queries_share_a_hash() {
        assert_eq!(query_hash("What is P vs NP?"), query_hash("what is  p vs np?"));
        assert_ne!(query_hash("What is P vs NP?"), query_hash("What is NP?"));
        assert_eq!(query_hash("x").len(), 16);
    }

    #[test]
    fn fingerprints_differ_per_user() {
        let alice = Fingerprint::new("alice", "Q");
        let bob = Fingerprint::new("bob", "Q");
        assert_eq!(alice.query_hash, bob.query_hash);
        assert_ne!(alice, bob);
    }

    #[test]
    fn trace_truncates_on_char_boundary() {
        let long = "é".repeat(600);
        let trace = Trace::new("op", "u", &long, "ok", 1.0, TraceMetadata::default());
        assert_eq!(trace.input.chars().count(), TRACE_TEXT_LIMIT);
        assert_eq!(trace.output, "ok");
    }

    #[test]
    fn memory_kind_is_internally_tagged() {
        let kind = MemoryKind::Response { query_hash: "ab12".into() };
        let json = serde_json::to_value(&kind).expect("serialize");
        assert_eq!(json, serde_json::json!({"kind": "response", "query_hash": "ab12"}));
        let back: MemoryKind = serde_json::from_value(serde_json::json!({"kind": "observation"})).expect("deserialize");
        assert_eq!(back, MemoryKind::Observation);
    }

    #[test]
    fn top_traits_sorted_by_score() {
        let mut traits = BTreeMap::new();
        traits.insert("concise".to_string(), 0.4);
        traits.insert("analytical".to_string(), 0.9);
        traits.insert("patient".to_string(), 0.6);
        let snapshot = IdentitySnapshot {
            summary: String::new(),
            traits,
            relationships: BTreeMap::new(),
            user: None,
            derived_at: Utc::now(),
        };
        assert_eq!(snapshot.top_traits(2), vec!["analytical", "patient"]);
    }
}
