//! The cognitive bridge: memory-aware generation over any provider.
//!
//! ```text
//! think(query, user)
//!   │
//!   ├─ rate limiter ── over limit ──► cache ► remembered answer ► refusal ► RateLimitExceeded
//!   ├─ response cache ── hit ───────► cached answer
//!   ├─ memory context + identity ──► system prompt
//!   ├─ provider (direct or routed)
//!   └─ cache write, remember exchange, trace
//! ```
//!
//! Cache and limiter are owned by the bridge; memory, identity and traces
//! live in the external [`MemoryStore`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use kore_core::clock::{Clock, SystemClock};
use kore_core::config::KoreConfig;
use kore_core::metrics::{BridgeCounters, CounterSnapshot};
use kore_core::types::{Fingerprint, IdentitySnapshot, MemoryId, MemoryKind, Trace, TraceMetadata, truncate_chars};
use kore_core::{MemoryStore, RateLimiter, ResponseCache};
use kore_llm::{Message, Provider, timed_generate};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::prompt;
use crate::reflection;

/// Per-call overrides for `think`. Unset fields use the configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThinkOptions {
    /// Consult the response cache. `false` bypasses the lookup only; a fresh
    /// answer is still written.
    pub use_cache: Option<bool>,
    /// Store the exchange in memory.
    pub remember: Option<bool>,
    /// Extra system prompt placed before the memory context.
    pub system: Option<String>,
}

impl ThinkOptions {
    /// All defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the cache lookup for this call.
    #[must_use]
    pub fn bypass_cache(mut self) -> Self {
        self.use_cache = Some(false);
        self
    }

    /// Override whether the exchange is remembered.
    #[must_use]
    pub fn remember(mut self, remember: bool) -> Self {
        self.remember = Some(remember);
        self
    }

    /// Add an extra system prompt.
    #[must_use]
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Where a rate-limited answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackSource {
    /// The response cache.
    Cache,
    /// The most recent remembered answer.
    Memory,
    /// The configured refusal text.
    Refusal,
}

/// How a `think` answer was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerSource {
    /// A provider was called.
    Fresh,
    /// Served from the response cache.
    CacheHit,
    /// Over the rate limit; served without a provider call.
    Fallback(FallbackSource),
}

/// Result of `think_with`.
#[derive(Debug, Clone, PartialEq)]
pub struct ThinkOutcome {
    /// The answer.
    pub text: String,
    /// How it was produced.
    pub source: AnswerSource,
    /// Provider that answered, for fresh answers.
    pub provider: Option<String>,
    /// Time spent in the bridge.
    pub duration: Duration,
}

impl ThinkOutcome {
    /// Whether a provider was called.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.source == AnswerSource::Fresh
    }
}

/// Builder for [`Bridge`].
pub struct BridgeBuilder {
    provider: Arc<dyn Provider>,
    memory: Arc<dyn MemoryStore>,
    config: KoreConfig,
    clock: Option<Arc<dyn Clock>>,
}

impl BridgeBuilder {
    /// Use this configuration instead of the defaults.
    #[must_use]
    pub fn config(mut self, config: KoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Read cache, limiter and snapshot time from `clock`.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the configuration and build.
    ///
    /// # Errors
    /// Returns `BridgeError::Config` if the configuration is invalid.
    pub fn build(self) -> Result<Bridge, BridgeError> {
        self.config
            .validate()
            .map_err(|e| BridgeError::Config(e.to_string()))?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let limiter = RateLimiter::with_clock(
            self.config.rate_limit.limit,
            self.config.rate_limit.window(),
            Arc::clone(&clock),
        );
        info!(
            provider = self.provider.name(),
            cache_ttl_secs = self.config.bridge.cache_ttl_secs,
            rate_limit = self.config.rate_limit.limit,
            "bridge ready"
        );
        Ok(Bridge {
            provider: self.provider,
            memory: self.memory,
            cache: ResponseCache::with_clock(Arc::clone(&clock)),
            clock,
            limiter,
            config: self.config,
            counters: BridgeCounters::new(),
        })
    }
}

/// Connects a memory store to a provider.
pub struct Bridge {
    provider: Arc<dyn Provider>,
    memory: Arc<dyn MemoryStore>,
    cache: ResponseCache,
    clock: Arc<dyn Clock>,
    limiter: RateLimiter,
    config: KoreConfig,
    counters: BridgeCounters,
}

impl Bridge {
    /// Start building a bridge over `provider` and `memory`.
    #[must_use]
    pub fn builder(provider: Arc<dyn Provider>, memory: Arc<dyn MemoryStore>) -> BridgeBuilder {
        BridgeBuilder {
            provider,
            memory,
            config: KoreConfig::default(),
            clock: None,
        }
    }

    /// Answer `query` for `user` with the configured defaults.
    ///
    /// # Errors
    /// See [`Bridge::think_with`].
    pub async fn think(&self, query: &str, user: &str) -> Result<String, BridgeError> {
        Ok(self.think_with(query, user, &ThinkOptions::default()).await?.text)
    }

    /// Answer `query` for `user`. An empty user means the configured default user.
    ///
    /// # Errors
    /// - `RateLimitExceeded` when over the limit with nothing to serve instead
    /// - `Provider` / `Routing` when the provider call fails; nothing is cached or remembered
    /// - `Memory` when the memory store fails. A failure while remembering
    ///   the exchange comes after the answer was cached, and may leave the
    ///   prompt record stored without its response record.
    pub async fn think_with(&self, query: &str, user: &str, options: &ThinkOptions) -> Result<ThinkOutcome, BridgeError> {
        let start = Instant::now();
        let user = self.resolve_user(user);
        let fingerprint = Fingerprint::new(user, query);
        BridgeCounters::bump(&self.counters.think_calls);

        if !self.limiter.check_fingerprint(&fingerprint) {
            BridgeCounters::bump(&self.counters.rate_limited);
            let (text, source) = self.fallback_answer(&fingerprint)?;
            BridgeCounters::bump(&self.counters.fallback_answers);
            info!(key = %fingerprint, ?source, "rate limited, served fallback");
            let metadata = TraceMetadata {
                cache_hit: source == FallbackSource::Cache,
                rate_limited: true,
                memories_used: usize::from(source == FallbackSource::Memory),
                provider: None,
            };
            return Ok(self.finish(query, user, text, AnswerSource::Fallback(source), None, metadata, start));
        }

        let use_cache = options.use_cache.unwrap_or(self.config.bridge.use_cache);
        if self.config.bridge.caching_enabled() && use_cache {
            if let Some(text) = self.cache.get_fingerprint(&fingerprint) {
                BridgeCounters::bump(&self.counters.cache_hits);
                let metadata = TraceMetadata {
                    cache_hit: true,
                    ..TraceMetadata::default()
                };
                return Ok(self.finish(query, user, text, AnswerSource::CacheHit, None, metadata, start));
            }
            BridgeCounters::bump(&self.counters.cache_misses);
        }

        let memories = self.memory.context_for(user, query, self.config.memory.context_limit)?;
        let identity = self.identity_for(user)?;
        let context = prompt::build_context(identity.as_ref(), &memories, options.system.as_deref());
        let messages = [Message::system(context), Message::user(query)];

        BridgeCounters::bump(&self.counters.provider_calls);
        let result = match timed_generate(self.provider.as_ref(), &messages).await {
            Ok(result) => result,
            Err(e) => {
                BridgeCounters::bump(&self.counters.provider_failures);
                warn!(key = %fingerprint, provider = self.provider.name(), error = %e, "provider call failed");
                return Err(e.into());
            }
        };
        debug!(
            key = %fingerprint,
            provider = %result.provider_name,
            latency_ms = result.latency_ms(),
            memories = memories.len(),
            "fresh answer"
        );

        if self.config.bridge.caching_enabled() {
            self.cache
                .put_fingerprint(fingerprint.clone(), result.text.clone(), self.config.bridge.cache_ttl());
        }
        if options.remember.unwrap_or(self.config.bridge.remember) {
            self.remember_exchange(&fingerprint, query, &result.text)?;
        }

        let metadata = TraceMetadata {
            memories_used: memories.len(),
            provider: Some(result.provider_name.clone()),
            ..TraceMetadata::default()
        };
        Ok(self.finish(query, user, result.text, AnswerSource::Fresh, Some(result.provider_name), metadata, start))
    }

    /// Append a fact to memory for `user`. Never touches the provider or cache.
    ///
    /// # Errors
    /// Returns `BridgeError::Memory` if the store fails.
    pub fn observe(&self, fact: &str, user: &str) -> Result<MemoryId, BridgeError> {
        let user = self.resolve_user(user);
        let id = self.memory.remember(user, fact, MemoryKind::Observation)?;
        BridgeCounters::bump(&self.counters.observations);
        debug!(user, memory = %id.0, "observation stored");
        Ok(id)
    }

    /// Derive an identity snapshot from accumulated memory of `user`, or of
    /// everyone for `None`, and save it to the memory store.
    ///
    /// Uses the provider's summarize category, so a router sends it to its
    /// `quality` route. Never consults the cache or rate limiter.
    ///
    /// # Errors
    /// `Provider` / `Routing` when the provider fails, `Memory` when the store fails.
    pub async fn reflect(&self, user: Option<&str>) -> Result<IdentitySnapshot, BridgeError> {
        let start = Instant::now();
        let memories = self.memory.memories(user, self.config.memory.reflect_limit)?;
        let messages = [
            Message::system(prompt::render_template(prompt::REFLECT_SYSTEM, &[])),
            Message::user(prompt::reflection_input(&memories)),
        ];

        BridgeCounters::bump(&self.counters.provider_calls);
        let raw = match self.provider.summarize(&messages).await {
            Ok(raw) => raw,
            Err(e) => {
                BridgeCounters::bump(&self.counters.provider_failures);
                warn!(provider = self.provider.name(), error = %e, "reflection failed");
                return Err(e.into());
            }
        };

        let identity = reflection::parse_identity(&raw, user, self.clock.now());
        self.memory.save_identity(&identity)?;
        BridgeCounters::bump(&self.counters.reflections);
        info!(user = user.unwrap_or("*"), memories = memories.len(), traits = identity.traits.len(), "reflection complete");

        if self.config.bridge.traces {
            let metadata = TraceMetadata {
                memories_used: memories.len(),
                provider: Some(self.provider.name().to_string()),
                ..TraceMetadata::default()
            };
            let trace = Trace::new(
                "bridge.reflect",
                user.unwrap_or(""),
                &messages[1].content,
                &identity.summary,
                elapsed_ms(start),
                metadata,
            );
            self.record_trace(trace);
        }
        Ok(identity)
    }

    /// Counter values.
    #[must_use]
    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// The response cache.
    #[must_use]
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// The rate limiter.
    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// The memory store.
    #[must_use]
    pub fn memory(&self) -> &Arc<dyn MemoryStore> {
        &self.memory
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &KoreConfig {
        &self.config
    }

    fn resolve_user<'a>(&'a self, user: &'a str) -> &'a str {
        if user.is_empty() { &self.config.bridge.default_user } else { user }
    }

    /// The user's own snapshot, else the global one.
    fn identity_for(&self, user: &str) -> Result<Option<IdentitySnapshot>, BridgeError> {
        match self.memory.identity(Some(user))? {
            Some(identity) => Ok(Some(identity)),
            None => Ok(self.memory.identity(None)?),
        }
    }

    fn fallback_answer(&self, fingerprint: &Fingerprint) -> Result<(String, FallbackSource), BridgeError> {
        if let Some(text) = self.cache.get_fingerprint(fingerprint) {
            return Ok((text, FallbackSource::Cache));
        }
        if let Some(text) = self.memory.recall_answer(fingerprint)? {
            return Ok((text, FallbackSource::Memory));
        }
        if let Some(refusal) = &self.config.rate_limit.refusal {
            return Ok((refusal.clone(), FallbackSource::Refusal));
        }
        warn!(key = %fingerprint, "rate limited with no fallback answer");
        Err(BridgeError::RateLimitExceeded {
            user: fingerprint.user.clone(),
            query_hash: fingerprint.query_hash.clone(),
        })
    }

    fn remember_exchange(&self, fingerprint: &Fingerprint, query: &str, response: &str) -> Result<(), BridgeError> {
        let limit = self.config.memory.excerpt_chars;
        let query_hash = fingerprint.query_hash.clone();
        self.memory.remember(
            &fingerprint.user,
            &truncate_chars(query, limit),
            MemoryKind::Prompt {
                query_hash: query_hash.clone(),
            },
        )?;
        self.memory.remember(
            &fingerprint.user,
            &truncate_chars(response, limit),
            MemoryKind::Response { query_hash },
        )?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        query: &str,
        user: &str,
        text: String,
        source: AnswerSource,
        provider: Option<String>,
        metadata: TraceMetadata,
        start: Instant,
    ) -> ThinkOutcome {
        if self.config.bridge.traces {
            let trace = Trace::new("bridge.think", user, query, &text, elapsed_ms(start), metadata);
            self.record_trace(trace);
        }
        ThinkOutcome {
            text,
            source,
            provider,
            duration: start.elapsed(),
        }
    }

    fn record_trace(&self, trace: Trace) {
        if let Err(e) = self.memory.record_trace(trace) {
            warn!(error = %e, "failed to record trace");
        }
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("provider", &self.provider.name())
            .field("cached", &self.cache.len())
            .field("config", &self.config.bridge)
            .finish_non_exhaustive()
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
