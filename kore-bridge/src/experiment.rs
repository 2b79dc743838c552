//! A/B runs: the same conversation through two providers.
//!
//! Both variants see an identical message sequence. Nothing is cached and,
//! unless `remember` is set, nothing is written to memory.

use std::fmt;
use std::sync::Arc;

use kore_core::MemoryStore;
use kore_core::config::{BridgeConfig, MemoryConfig};
use kore_core::types::{Fingerprint, MemoryKind, truncate_chars};
use kore_llm::{Message, Provider, ProviderResult, timed_generate};
use tracing::{info, warn};

use crate::error::BridgeError;
use crate::prompt;

/// One side of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// First provider.
    A,
    /// Second provider.
    B,
}

/// Outcome of one experiment run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentResult {
    /// The query both variants answered.
    pub query: String,
    /// Variant A's answer and latency.
    pub variant_a: ProviderResult,
    /// Variant B's answer and latency.
    pub variant_b: ProviderResult,
    /// Strictly faster variant; A on a tie.
    pub faster: Variant,
}

impl ExperimentResult {
    fn new(query: &str, variant_a: ProviderResult, variant_b: ProviderResult) -> Self {
        let faster = if variant_a.latency <= variant_b.latency {
            Variant::A
        } else {
            Variant::B
        };
        Self {
            query: query.to_string(),
            variant_a,
            variant_b,
            faster,
        }
    }
}

/// Runs queries through two providers for comparison.
pub struct Experiment {
    variant_a: Arc<dyn Provider>,
    variant_b: Arc<dyn Provider>,
    memory: Option<Arc<dyn MemoryStore>>,
    remember: bool,
    system: Option<String>,
    user: String,
    context_limit: usize,
    excerpt_chars: usize,
}

impl Experiment {
    /// Compare `variant_a` against `variant_b` with no memory attached.
    #[must_use]
    pub fn new(variant_a: Arc<dyn Provider>, variant_b: Arc<dyn Provider>) -> Self {
        let memory_config = MemoryConfig::default();
        Self {
            variant_a,
            variant_b,
            memory: None,
            remember: false,
            system: None,
            user: BridgeConfig::default().default_user,
            context_limit: memory_config.context_limit,
            excerpt_chars: memory_config.excerpt_chars,
        }
    }

    /// Pull context from `memory` into the shared prompt.
    #[must_use]
    pub fn with_memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Context size and excerpt length from `[memory]` config.
    #[must_use]
    pub fn memory_config(mut self, config: &MemoryConfig) -> Self {
        self.context_limit = config.context_limit;
        self.excerpt_chars = config.excerpt_chars;
        self
    }

    /// Store both exchanges in the attached memory store. Without one, runs
    /// log a warning and store nothing.
    #[must_use]
    pub fn remember(mut self, remember: bool) -> Self {
        self.remember = remember;
        self
    }

    /// Extra system prompt for both variants.
    #[must_use]
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// User whose memory is read and written.
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        let user = user.into();
        if !user.is_empty() {
            self.user = user;
        }
        self
    }

    /// Run `query` through A, then B.
    ///
    /// # Errors
    /// `Provider` / `Routing` if either variant fails, `Memory` if the
    /// attached store fails.
    pub async fn run(&self, query: &str) -> Result<ExperimentResult, BridgeError> {
        let messages = self.messages_for(query)?;
        let variant_a = timed_generate(self.variant_a.as_ref(), &messages).await?;
        let variant_b = timed_generate(self.variant_b.as_ref(), &messages).await?;

        if self.remember {
            self.remember_results(query, &[&variant_a, &variant_b])?;
        }

        let result = ExperimentResult::new(query, variant_a, variant_b);
        info!(
            a = %result.variant_a.provider_name,
            a_ms = result.variant_a.latency_ms(),
            b = %result.variant_b.provider_name,
            b_ms = result.variant_b.latency_ms(),
            faster = ?result.faster,
            "experiment run"
        );
        Ok(result)
    }

    /// Run each query in order.
    ///
    /// # Errors
    /// Stops at the first failing query.
    pub async fn run_batch<S: AsRef<str>>(&self, queries: &[S]) -> Result<Vec<ExperimentResult>, BridgeError> {
        let mut results = Vec::with_capacity(queries.len());
        for query in queries {
            results.push(self.run(query.as_ref()).await?);
        }
        Ok(results)
    }

    fn messages_for(&self, query: &str) -> Result<[Message; 2], BridgeError> {
        let (identity, memories) = match &self.memory {
            Some(memory) => {
                let identity = match memory.identity(Some(self.user.as_str()))? {
                    Some(identity) => Some(identity),
                    None => memory.identity(None)?,
                };
                (identity, memory.context_for(&self.user, query, self.context_limit)?)
            }
            None => (None, Vec::new()),
        };
        let context = prompt::build_context(identity.as_ref(), &memories, self.system.as_deref());
        Ok([Message::system(context), Message::user(query)])
    }

    fn remember_results(&self, query: &str, results: &[&ProviderResult]) -> Result<(), BridgeError> {
        let Some(memory) = &self.memory else {
            warn!(user = %self.user, "experiment has remember set but no memory store; results not stored");
            return Ok(());
        };
        let query_hash = Fingerprint::new(&self.user, query).query_hash;
        let prompt_text = truncate_chars(query, self.excerpt_chars);
        for result in results {
            memory.remember(
                &self.user,
                &prompt_text,
                MemoryKind::Prompt {
                    query_hash: query_hash.clone(),
                },
            )?;
            memory.remember(
                &self.user,
                &truncate_chars(&result.text, self.excerpt_chars),
                MemoryKind::Response {
                    query_hash: query_hash.clone(),
                },
            )?;
        }
        Ok(())
    }
}

impl fmt::Debug for Experiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Experiment")
            .field("variant_a", &self.variant_a.name())
            .field("variant_b", &self.variant_b.name())
            .field("remember", &self.remember)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}
