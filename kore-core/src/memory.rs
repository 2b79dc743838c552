//! Memory store contract and an in-process reference store.
//!
//! The bridge never owns durable memory: everything it remembers, recalls
//! or traces goes through [`MemoryStore`]. Real deployments plug in their
//! own store; [`InMemoryStore`] backs tests and single-process use.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::types::{Fingerprint, IdentitySnapshot, MemoryId, MemoryKind, MemoryRecord, Trace, normalize_query};

/// External memory collaborator.
///
/// All methods are synchronous; only provider calls suspend.
pub trait MemoryStore: Send + Sync {
    /// Append a memory for `user`.
    ///
    /// # Errors
    /// Returns an error if the store cannot persist the record.
    fn remember(&self, user: &str, content: &str, kind: MemoryKind) -> Result<MemoryId>;

    /// Up to `limit` memories of `user`, most relevant to `query` first,
    /// most recent first among equally relevant ones.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    fn context_for(&self, user: &str, query: &str, limit: usize) -> Result<Vec<MemoryRecord>>;

    /// Most recent remembered answer to this fingerprint's query for its user.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    fn recall_answer(&self, fingerprint: &Fingerprint) -> Result<Option<String>>;

    /// Up to `limit` memories, most recent first. `None` means all users.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    fn memories(&self, user: Option<&str>, limit: usize) -> Result<Vec<MemoryRecord>>;

    /// Last identity snapshot saved for `user` (`None` = global).
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    fn identity(&self, user: Option<&str>) -> Result<Option<IdentitySnapshot>>;

    /// Save an identity snapshot, replacing the previous one for the same user.
    ///
    /// # Errors
    /// Returns an error if the store cannot persist the snapshot.
    fn save_identity(&self, snapshot: &IdentitySnapshot) -> Result<()>;

    /// Record an observability trace.
    ///
    /// # Errors
    /// Returns an error if the store cannot persist the trace.
    fn record_trace(&self, trace: Trace) -> Result<()>;
}

#[derive(Default)]
struct StoreInner {
    /// Records in insertion order; index doubles as recency.
    records: Vec<MemoryRecord>,
    identities: HashMap<Option<String>, IdentitySnapshot>,
    traces: Vec<Trace>,
}

/// Thread-safe in-process memory store.
pub struct InMemoryStore {
    inner: RwLock<StoreInner>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStore {
    /// Create an empty store on the wall clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store stamping records with `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            clock,
        }
    }

    /// Total number of memories.
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Number of memories owned by `user`.
    #[must_use]
    pub fn count_for(&self, user: &str) -> usize {
        self.inner.read().records.iter().filter(|r| r.user == user).count()
    }

    /// Copy of every recorded trace, oldest first.
    #[must_use]
    pub fn traces(&self) -> Vec<Trace> {
        self.inner.read().traces.clone()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of distinct query words that also appear in `content`.
fn overlap_score(query_words: &HashSet<String>, content: &str) -> usize {
    if query_words.is_empty() {
        return 0;
    }
    let normalized = normalize_query(content);
    normalized
        .split(' ')
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .collect::<HashSet<_>>()
        .into_iter()
        .filter(|w| query_words.contains(*w))
        .count()
}

fn query_words(query: &str) -> HashSet<String> {
    normalize_query(query)
        .split(' ')
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| w.len() > 2)
        .collect()
}

impl MemoryStore for InMemoryStore {
    fn remember(&self, user: &str, content: &str, kind: MemoryKind) -> Result<MemoryId> {
        let record = MemoryRecord {
            id: MemoryId::new(),
            user: user.to_string(),
            content: content.to_string(),
            kind,
            created_at: self.clock.now(),
        };
        let id = record.id;
        self.inner.write().records.push(record);
        Ok(id)
    }

    fn context_for(&self, user: &str, query: &str, limit: usize) -> Result<Vec<MemoryRecord>> {
        let words = query_words(query);
        let inner = self.inner.read();
        let mut scored: Vec<(usize, usize, &MemoryRecord)> = inner
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.user == user)
            .map(|(idx, r)| (overlap_score(&words, &r.content), idx, r))
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        Ok(scored.into_iter().take(limit).map(|(_, _, r)| r.clone()).collect())
    }

    fn recall_answer(&self, fingerprint: &Fingerprint) -> Result<Option<String>> {
        let inner = self.inner.read();
        let answer = inner.records.iter().rev().find_map(|r| match &r.kind {
            MemoryKind::Response { query_hash }
                if r.user == fingerprint.user && *query_hash == fingerprint.query_hash =>
            {
                Some(r.content.clone())
            }
            _ => None,
        });
        Ok(answer)
    }

    fn memories(&self, user: Option<&str>, limit: usize) -> Result<Vec<MemoryRecord>> {
        let inner = self.inner.read();
        Ok(inner
            .records
            .iter()
            .rev()
            .filter(|r| user.is_none_or(|u| r.user == u))
            .take(limit)
            .cloned()
            .collect())
    }

    fn identity(&self, user: Option<&str>) -> Result<Option<IdentitySnapshot>> {
        let key = user.map(str::to_string);
        Ok(self.inner.read().identities.get(&key).cloned())
    }

    fn save_identity(&self, snapshot: &IdentitySnapshot) -> Result<()> {
        self.inner
            .write()
            .identities
            .insert(snapshot.user.clone(), snapshot.clone());
        Ok(())
    }

    fn record_trace(&self, trace: Trace) -> Result<()> {
        self.inner.write().traces.push(trace);
        Ok(())
    }
}
