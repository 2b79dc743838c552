//! End-to-end bridge flows: caching, isolation, expiry, rate limiting,
//! routing, reflection and failure handling.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Duration;
use kore_bridge::{AnswerSource, Bridge, BridgeError, FallbackSource, ThinkOptions};
use kore_core::config::KoreConfig;
use kore_core::types::{Fingerprint, IdentitySnapshot, MemoryId, MemoryKind, MemoryRecord, Trace};
use kore_core::{Clock, InMemoryStore, KoreError, ManualClock, MemoryStore};
use kore_llm::types::last_user_content;
use kore_llm::{CallableProvider, LlmError, Message, Provider, RouteTable, Router};

/// Provider that numbers its answers so repeated calls are distinguishable.
fn counting(name: &'static str) -> (CallableProvider, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let provider = CallableProvider::infallible(name, move |msgs: &[Message]| {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{name}#{n}: {}", last_user_content(msgs))
    });
    (provider, calls)
}

/// Provider that records every system prompt it sees.
fn recording() -> (CallableProvider, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let provider = CallableProvider::infallible("recorder", move |msgs: &[Message]| {
        let system = msgs.first().map(|m| m.content.clone()).unwrap_or_default();
        sink.lock().expect("lock").push(system);
        "noted".to_string()
    });
    (provider, seen)
}

fn bridge_with(provider: Arc<dyn Provider>, store: Arc<InMemoryStore>, config: KoreConfig, clock: &ManualClock) -> Bridge {
    let clock: Arc<dyn Clock> = Arc::new(clock.clone());
    Bridge::builder(provider, store)
        .config(config)
        .clock(clock)
        .build()
        .expect("bridge")
}

fn no_cache_config() -> KoreConfig {
    let mut config = KoreConfig::default();
    config.bridge.cache_ttl_secs = 0;
    config
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[tokio::test]
async fn repeated_query_is_idempotent() {
    let (provider, calls) = counting("llm");
    let bridge = bridge_with(Arc::new(provider), Arc::new(InMemoryStore::new()), KoreConfig::default(), &ManualClock::new());

    let first = bridge.think("What is P vs NP?", "alice").await.expect("think");
    let second = bridge.think("What is P vs NP?", "alice").await.expect("think");

    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn bypassing_cache_calls_provider_once_more() {
    let (provider, calls) = counting("llm");
    let bridge = bridge_with(Arc::new(provider), Arc::new(InMemoryStore::new()), KoreConfig::default(), &ManualClock::new());

    bridge.think("What is P vs NP?", "").await.expect("think");
    bridge.think("What is P vs NP?", "").await.expect("think");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let third = bridge
        .think_with("What is P vs NP?", "", &ThinkOptions::new().bypass_cache())
        .await
        .expect("think");
    assert!(third.is_fresh());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn normalized_queries_share_an_entry() {
    let (provider, calls) = counting("llm");
    let bridge = bridge_with(Arc::new(provider), Arc::new(InMemoryStore::new()), KoreConfig::default(), &ManualClock::new());

    bridge.think("What is  P vs NP?", "alice").await.expect("think");
    let outcome = bridge
        .think_with("  what is p VS np?", "alice", &ThinkOptions::new())
        .await
        .expect("think");
    assert_eq!(outcome.source, AnswerSource::CacheHit);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn users_never_share_cache_entries() {
    let (provider, calls) = counting("llm");
    let bridge = bridge_with(Arc::new(provider), Arc::new(InMemoryStore::new()), KoreConfig::default(), &ManualClock::new());

    let alice = bridge.think("Q", "alice").await.expect("think");
    let bob = bridge.think("Q", "bob").await.expect("think");

    assert_ne!(alice, bob);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(bridge.cache().get("bob", "Q").as_deref(), Some(bob.as_str()));
}

#[tokio::test]
async fn expired_entry_triggers_one_fresh_call() {
    let clock = ManualClock::new();
    let mut config = KoreConfig::default();
    config.bridge.cache_ttl_secs = 60;
    let (provider, calls) = counting("llm");
    let bridge = bridge_with(Arc::new(provider), Arc::new(InMemoryStore::new()), config, &clock);

    bridge.think("Q", "alice").await.expect("think");
    clock.advance(Duration::seconds(59));
    bridge.think("Q", "alice").await.expect("think");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    clock.advance(Duration::seconds(1));
    let outcome = bridge.think_with("Q", "alice", &ThinkOptions::new()).await.expect("think");
    assert!(outcome.is_fresh());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn zero_ttl_disables_cache_writes() {
    let (provider, calls) = counting("llm");
    let bridge = bridge_with(Arc::new(provider), Arc::new(InMemoryStore::new()), no_cache_config(), &ManualClock::new());

    bridge.think("Q", "alice").await.expect("think");
    bridge.think("Q", "alice").await.expect("think");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(bridge.cache().is_empty());
}

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

fn limited(limit: u32) -> KoreConfig {
    let mut config = KoreConfig::default();
    config.rate_limit.limit = limit;
    config.rate_limit.window_secs = 3600;
    config
}

#[tokio::test]
async fn fourth_repeat_is_served_from_cache() {
    let (provider, calls) = counting("llm");
    let bridge = bridge_with(Arc::new(provider), Arc::new(InMemoryStore::new()), limited(3), &ManualClock::new());
    let bypass = ThinkOptions::new().bypass_cache();

    for _ in 0..3 {
        bridge.think_with("Q", "alice", &bypass).await.expect("think");
    }
    let fourth = bridge.think_with("Q", "alice", &bypass).await.expect("think");

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(fourth.source, AnswerSource::Fallback(FallbackSource::Cache));
    assert_eq!(fourth.text, "llm#3: Q");
    assert_eq!(bridge.counters().rate_limited, 1);
}

#[tokio::test]
async fn fallback_uses_remembered_answer_without_cache() {
    let (provider, calls) = counting("llm");
    let mut config = no_cache_config();
    config.rate_limit = limited(3).rate_limit;
    let bridge = bridge_with(Arc::new(provider), Arc::new(InMemoryStore::new()), config, &ManualClock::new());

    for _ in 0..3 {
        bridge.think("Q", "alice").await.expect("think");
    }
    let fourth = bridge.think_with("Q", "alice", &ThinkOptions::new()).await.expect("think");

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(fourth.source, AnswerSource::Fallback(FallbackSource::Memory));
    assert_eq!(fourth.text, "llm#3: Q");
}

#[tokio::test]
async fn over_limit_without_fallback_fails() {
    let (provider, calls) = counting("llm");
    let mut config = no_cache_config();
    config.bridge.remember = false;
    config.rate_limit = limited(3).rate_limit;
    let bridge = bridge_with(Arc::new(provider), Arc::new(InMemoryStore::new()), config, &ManualClock::new());

    for _ in 0..3 {
        bridge.think("Q", "alice").await.expect("think");
    }
    let err = bridge.think("Q", "alice").await.expect_err("must be limited");

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(matches!(err, BridgeError::RateLimitExceeded { ref user, .. } if user == "alice"));
}

#[tokio::test]
async fn refusal_text_replaces_error() {
    let (provider, _calls) = counting("llm");
    let mut config = no_cache_config();
    config.bridge.remember = false;
    config.rate_limit = limited(1).rate_limit;
    config.rate_limit.refusal = Some("Ask me something new.".into());
    let bridge = bridge_with(Arc::new(provider), Arc::new(InMemoryStore::new()), config, &ManualClock::new());

    bridge.think("Q", "alice").await.expect("think");
    let second = bridge.think_with("Q", "alice", &ThinkOptions::new()).await.expect("think");
    assert_eq!(second.source, AnswerSource::Fallback(FallbackSource::Refusal));
    assert_eq!(second.text, "Ask me something new.");
}

#[tokio::test]
async fn limit_resets_after_window() {
    let clock = ManualClock::new();
    let (provider, calls) = counting("llm");
    let mut config = no_cache_config();
    config.bridge.remember = false;
    config.rate_limit = limited(1).rate_limit;
    let bridge = bridge_with(Arc::new(provider), Arc::new(InMemoryStore::new()), config, &clock);

    bridge.think("Q", "alice").await.expect("think");
    assert!(bridge.think("Q", "alice").await.is_err());
    assert!(bridge.think("Q", "bob").await.is_ok());

    clock.advance(Duration::seconds(3600));
    bridge.think("Q", "alice").await.expect("window elapsed");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_repeats_respect_the_limit() {
    let (provider, calls) = counting("llm");
    let mut config = no_cache_config();
    config.bridge.remember = false;
    config.rate_limit = limited(5).rate_limit;
    let bridge = Arc::new(bridge_with(Arc::new(provider), Arc::new(InMemoryStore::new()), config, &ManualClock::new()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let bridge = Arc::clone(&bridge);
            tokio::spawn(async move { bridge.think("Q", "alice").await })
        })
        .collect();

    let mut allowed = 0;
    for handle in handles {
        if handle.await.expect("join").is_ok() {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 5);
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

fn routed_bridge() -> (Bridge, Arc<Router>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let (fast, fast_calls) = counting("fast");
    let (quality, quality_calls) = counting("quality");
    let quality = quality.with_summarizer(|_| {
        Ok(r#"```json
{"summary": "A careful maths tutor.", "traits": {"rigorous": 0.9, "patient": 0.6}, "relationships": {"alice": "student"}}
```"#
            .to_string())
    });
    let router = Router::new(RouteTable::new().route("fast", fast).route("quality", quality))
        .expect("router")
        .with_route_fn(|msgs| {
            if last_user_content(msgs).contains("proof") {
                "quality".to_string()
            } else {
                "fast".to_string()
            }
        });
    let router = Arc::new(router);
    let bridge = Bridge::builder(router.clone(), Arc::new(InMemoryStore::new()))
        .build()
        .expect("bridge");
    (bridge, router, fast_calls, quality_calls)
}

#[tokio::test]
async fn decision_function_picks_the_provider() {
    let (bridge, router, fast_calls, quality_calls) = routed_bridge();
    assert_eq!(router.last_route(), None);

    let answer = bridge.think("hello there", "alice").await.expect("think");
    assert!(answer.starts_with("fast#1"));
    assert_eq!(router.last_route().as_deref(), Some("fast"));

    let answer = bridge.think("check my proof", "alice").await.expect("think");
    assert!(answer.starts_with("quality#1"));
    assert_eq!(router.last_route().as_deref(), Some("quality"));

    assert_eq!(fast_calls.load(Ordering::SeqCst), 1);
    assert_eq!(quality_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn reflect_goes_to_quality_and_feeds_later_context() {
    let (bridge, router, fast_calls, _) = routed_bridge();
    bridge.observe("Alice is studying complexity theory", "alice").expect("observe");

    let identity = bridge.reflect(Some("alice")).await.expect("reflect");
    assert_eq!(router.last_route().as_deref(), Some("quality"));
    assert_eq!(fast_calls.load(Ordering::SeqCst), 0);
    assert_eq!(identity.summary, "A careful maths tutor.");
    assert_eq!(identity.top_traits(1), vec!["rigorous"]);

    let stored = bridge.memory().identity(Some("alice")).expect("identity");
    assert_eq!(stored.as_ref(), Some(&identity));
}

#[tokio::test]
async fn unknown_route_is_a_routing_error() {
    let (provider, _) = counting("only");
    let router = Router::new(RouteTable::new().route("only", provider))
        .expect("router")
        .with_route_fn(|_| "expert".to_string());
    let store = Arc::new(InMemoryStore::new());
    let bridge = Bridge::builder(Arc::new(router), store.clone()).build().expect("bridge");

    let err = bridge.think("Q", "alice").await.expect_err("must fail");
    assert!(matches!(err, BridgeError::Routing { ref route } if route == "expert"));
    assert_eq!(store.count(), 0);
}

// ---------------------------------------------------------------------------
// Memory, identity and failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn context_includes_observations_and_identity() {
    let (provider, seen) = recording();
    let store = Arc::new(InMemoryStore::new());
    let bridge = bridge_with(Arc::new(provider), store.clone(), KoreConfig::default(), &ManualClock::new());

    bridge.observe("Alice prefers short answers", "alice").expect("observe");
    bridge.reflect(Some("alice")).await.expect("reflect");
    bridge.think("How do short proofs work?", "alice").await.expect("think");

    let prompts = seen.lock().expect("lock");
    let context = prompts.last().expect("think prompt");
    assert!(context.contains("- Alice prefers short answers"));
    assert!(context.contains("Your identity: noted"));
}

#[tokio::test]
async fn reflect_on_empty_memory_still_asks_provider() {
    let (provider, calls) = counting("llm");
    let bridge = bridge_with(Arc::new(provider), Arc::new(InMemoryStore::new()), KoreConfig::default(), &ManualClock::new());

    let identity = bridge.reflect(None).await.expect("reflect");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(identity.summary, "llm#1: No memories yet.");
    assert_eq!(identity.user, None);
}

#[tokio::test]
async fn provider_failure_commits_nothing() {
    let provider = CallableProvider::new("down", |_| Err(LlmError::Unavailable("connection refused".into())));
    let store = Arc::new(InMemoryStore::new());
    let bridge = bridge_with(Arc::new(provider), store.clone(), KoreConfig::default(), &ManualClock::new());

    let err = bridge.think("Q", "alice").await.expect_err("must fail");
    assert!(matches!(err, BridgeError::Provider(LlmError::Unavailable(_))));
    assert!(bridge.cache().is_empty());
    assert_eq!(store.count(), 0);
    assert_eq!(bridge.counters().provider_failures, 1);
}

#[tokio::test]
async fn remember_false_keeps_memory_clean() {
    let (provider, _) = counting("llm");
    let store = Arc::new(InMemoryStore::new());
    let bridge = bridge_with(Arc::new(provider), store.clone(), KoreConfig::default(), &ManualClock::new());

    bridge
        .think_with("Q", "alice", &ThinkOptions::new().remember(false))
        .await
        .expect("think");
    assert_eq!(store.count(), 0);
    bridge.think("Q2", "alice").await.expect("think");
    assert_eq!(store.count_for("alice"), 2);
}

#[tokio::test]
async fn traces_record_cache_hits() {
    let (provider, _) = counting("llm");
    let store = Arc::new(InMemoryStore::new());
    let mut config = KoreConfig::default();
    config.bridge.traces = true;
    let bridge = bridge_with(Arc::new(provider), store.clone(), config, &ManualClock::new());

    bridge.think("Q", "alice").await.expect("think");
    bridge.think("Q", "alice").await.expect("think");

    let traces = store.traces();
    assert_eq!(traces.len(), 2);
    assert_eq!(traces[0].operation, "bridge.think");
    assert!(!traces[0].metadata.cache_hit);
    assert_eq!(traces[0].metadata.provider.as_deref(), Some("llm"));
    assert!(traces[1].metadata.cache_hit);
    assert_eq!(traces[1].user, "alice");
}

#[tokio::test]
async fn extra_system_prompt_leads_context() {
    let (provider, seen) = recording();
    let bridge = bridge_with(Arc::new(provider), Arc::new(InMemoryStore::new()), KoreConfig::default(), &ManualClock::new());

    bridge
        .think_with("Q", "alice", &ThinkOptions::new().system("Answer in French."))
        .await
        .expect("think");
    let prompts = seen.lock().expect("lock");
    assert!(prompts[0].starts_with("Answer in French.\n\n"));
}

#[tokio::test]
async fn counters_track_the_flow() {
    let (provider, _) = counting("llm");
    let bridge = bridge_with(Arc::new(provider), Arc::new(InMemoryStore::new()), KoreConfig::default(), &ManualClock::new());

    bridge.think("Q", "alice").await.expect("think");
    bridge.think("Q", "alice").await.expect("think");
    bridge.observe("fact", "alice").expect("observe");

    let snapshot = bridge.counters();
    assert_eq!(snapshot.think_calls, 2);
    assert_eq!(snapshot.cache_hits, 1);
    assert_eq!(snapshot.cache_misses, 1);
    assert_eq!(snapshot.provider_calls, 1);
    assert_eq!(snapshot.observations, 1);
    assert!(snapshot.to_prometheus().contains("kore_cache_hits_total 1"));
}

// ---------------------------------------------------------------------------
// Memory store failures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreOp {
    Remember,
    Context,
    Memories,
    SaveIdentity,
    Trace,
}

/// In-memory store whose chosen operations fail.
struct FlakyStore {
    inner: InMemoryStore,
    failing: Vec<StoreOp>,
    remembers_allowed: usize,
    remembers: AtomicUsize,
}

impl FlakyStore {
    fn failing(ops: &[StoreOp]) -> Arc<Self> {
        Self::remember_then_fail(ops, 0)
    }

    /// Let `allowed` remembers through before `Remember` starts failing.
    fn remember_then_fail(ops: &[StoreOp], allowed: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryStore::new(),
            failing: ops.to_vec(),
            remembers_allowed: allowed,
            remembers: AtomicUsize::new(0),
        })
    }

    fn check(&self, op: StoreOp) -> kore_core::Result<()> {
        if self.failing.contains(&op) {
            Err(KoreError::Memory(format!("{op:?} down")))
        } else {
            Ok(())
        }
    }
}

impl MemoryStore for FlakyStore {
    fn remember(&self, user: &str, content: &str, kind: MemoryKind) -> kore_core::Result<MemoryId> {
        if self.remembers.fetch_add(1, Ordering::SeqCst) >= self.remembers_allowed {
            self.check(StoreOp::Remember)?;
        }
        self.inner.remember(user, content, kind)
    }

    fn context_for(&self, user: &str, query: &str, limit: usize) -> kore_core::Result<Vec<MemoryRecord>> {
        self.check(StoreOp::Context)?;
        self.inner.context_for(user, query, limit)
    }

    fn recall_answer(&self, fingerprint: &Fingerprint) -> kore_core::Result<Option<String>> {
        self.inner.recall_answer(fingerprint)
    }

    fn memories(&self, user: Option<&str>, limit: usize) -> kore_core::Result<Vec<MemoryRecord>> {
        self.check(StoreOp::Memories)?;
        self.inner.memories(user, limit)
    }

    fn identity(&self, user: Option<&str>) -> kore_core::Result<Option<IdentitySnapshot>> {
        self.inner.identity(user)
    }

    fn save_identity(&self, snapshot: &IdentitySnapshot) -> kore_core::Result<()> {
        self.check(StoreOp::SaveIdentity)?;
        self.inner.save_identity(snapshot)
    }

    fn record_trace(&self, trace: Trace) -> kore_core::Result<()> {
        self.check(StoreOp::Trace)?;
        self.inner.record_trace(trace)
    }
}

fn flaky_bridge(provider: Arc<dyn Provider>, store: Arc<FlakyStore>, config: KoreConfig) -> Bridge {
    Bridge::builder(provider, store).config(config).build().expect("bridge")
}

fn is_store_failure(err: &BridgeError, op: StoreOp) -> bool {
    matches!(err, BridgeError::Memory(KoreError::Memory(msg)) if *msg == format!("{op:?} down"))
}

#[tokio::test]
async fn failed_remember_still_caches_the_answer() {
    let (provider, calls) = counting("llm");
    let store = FlakyStore::failing(&[StoreOp::Remember]);
    let bridge = flaky_bridge(Arc::new(provider), store.clone(), KoreConfig::default());

    let err = bridge.think("hello", "alice").await.expect_err("remember fails");
    assert!(is_store_failure(&err, StoreOp::Remember), "{err}");
    assert_eq!(bridge.cache().len(), 1);

    let retry = bridge.think("hello", "alice").await.expect("served from cache");
    assert_eq!(retry, "llm#1: hello");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.inner.count(), 0);
}

#[tokio::test]
async fn half_remembered_exchange_keeps_the_prompt() {
    let (provider, _) = counting("llm");
    let store = FlakyStore::remember_then_fail(&[StoreOp::Remember], 1);
    let bridge = flaky_bridge(Arc::new(provider), store.clone(), KoreConfig::default());

    let err = bridge.think("hello", "alice").await.expect_err("response write fails");
    assert!(is_store_failure(&err, StoreOp::Remember));
    let records = store.inner.memories(Some("alice"), 10).expect("memories");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind.label(), "prompt");
    assert_eq!(bridge.cache().len(), 1);
}

#[tokio::test]
async fn context_failure_stops_before_the_provider() {
    let (provider, calls) = counting("llm");
    let bridge = flaky_bridge(Arc::new(provider), FlakyStore::failing(&[StoreOp::Context]), KoreConfig::default());

    let err = bridge.think("hello", "alice").await.expect_err("context fails");
    assert!(is_store_failure(&err, StoreOp::Context));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(bridge.cache().is_empty());
}

#[test]
fn observe_surfaces_store_failure_unchanged() {
    let (provider, calls) = counting("llm");
    let bridge = flaky_bridge(Arc::new(provider), FlakyStore::failing(&[StoreOp::Remember]), KoreConfig::default());

    let err = bridge.observe("Alice likes proofs", "alice").expect_err("remember fails");
    assert!(is_store_failure(&err, StoreOp::Remember));
    assert_eq!(bridge.counters().observations, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn reflect_fails_when_memories_cannot_be_read() {
    let (provider, calls) = counting("llm");
    let bridge = flaky_bridge(Arc::new(provider), FlakyStore::failing(&[StoreOp::Memories]), KoreConfig::default());

    let err = bridge.reflect(Some("alice")).await.expect_err("memories fails");
    assert!(is_store_failure(&err, StoreOp::Memories));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn reflect_fails_when_identity_cannot_be_saved() {
    let (provider, calls) = counting("llm");
    let store = FlakyStore::failing(&[StoreOp::SaveIdentity]);
    let bridge = flaky_bridge(Arc::new(provider), store.clone(), KoreConfig::default());

    let err = bridge.reflect(None).await.expect_err("save fails");
    assert!(is_store_failure(&err, StoreOp::SaveIdentity));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.inner.identity(None).expect("identity"), None);
    assert_eq!(bridge.counters().reflections, 0);
}

#[tokio::test]
async fn trace_failure_never_fails_the_call() {
    let (provider, _) = counting("llm");
    let mut config = KoreConfig::default();
    config.bridge.traces = true;
    let store = FlakyStore::failing(&[StoreOp::Trace]);
    let bridge = flaky_bridge(Arc::new(provider), store.clone(), config);

    assert_eq!(bridge.think("hello", "alice").await.expect("fresh"), "llm#1: hello");
    assert_eq!(bridge.think("hello", "alice").await.expect("cached"), "llm#1: hello");
    bridge.reflect(Some("alice")).await.expect("reflect");
    assert!(store.inner.traces().is_empty());
    assert_eq!(store.inner.count_for("alice"), 2);
}
