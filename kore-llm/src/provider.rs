//! The provider contract and the callable adapter.
//!
//! Every backend (local runner, hosted API, closure, router) implements
//! [`Provider`]: one `generate` call over an ordered message sequence.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use crate::error::LlmError;
use crate::types::{Message, ProviderResult};

/// A text generation backend.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Name used in traces, experiment results and logs.
    fn name(&self) -> &str;

    /// Generate a reply to `messages` (oldest first).
    ///
    /// # Errors
    /// Fails when the backend is unreachable, times out or returns
    /// something that is not usable text.
    async fn generate(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// Generate in the "summarize" operation category.
    ///
    /// Plain providers treat it like [`Provider::generate`]; routers use it
    /// to force their strongest route.
    ///
    /// # Errors
    /// Same as [`Provider::generate`].
    async fn summarize(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.generate(messages).await
    }
}

/// Call `generate` and time it.
///
/// # Errors
/// Propagates the provider's error unchanged.
pub async fn timed_generate(
    provider: &dyn Provider,
    messages: &[Message],
) -> Result<ProviderResult, LlmError> {
    let start = Instant::now();
    let text = provider.generate(messages).await?;
    let latency = start.elapsed();
    debug!(provider = provider.name(), latency_ms = latency.as_millis() as u64, "provider call finished");
    Ok(ProviderResult {
        text,
        provider_name: provider.name().to_string(),
        latency,
    })
}

type GenerateFn = Arc<dyn Fn(&[Message]) -> Result<String, LlmError> + Send + Sync>;

/// Wraps a closure as a provider.
///
/// ```
/// use kore_llm::{CallableProvider, Message};
///
/// let echo = CallableProvider::infallible("echo", |msgs: &[Message]| {
///     format!("Echo: {}", msgs.last().map_or("", |m| m.content.as_str()))
/// });
/// # let _ = echo;
/// ```
#[derive(Clone)]
pub struct CallableProvider {
    name: String,
    generate: GenerateFn,
    summarize: Option<GenerateFn>,
}

impl CallableProvider {
    /// Wrap a fallible closure.
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Message]) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            generate: Arc::new(f),
            summarize: None,
        }
    }

    /// Wrap a closure that always succeeds.
    pub fn infallible<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Message]) -> String + Send + Sync + 'static,
    {
        Self::new(name, move |messages| Ok(f(messages)))
    }

    /// Use a different closure for the summarize category.
    #[must_use]
    pub fn with_summarizer<F>(mut self, f: F) -> Self
    where
        F: Fn(&[Message]) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        self.summarize = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for CallableProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallableProvider")
            .field("name", &self.name)
            .field("custom_summarizer", &self.summarize.is_some())
            .finish()
    }
}

#[async_trait]
impl Provider for CallableProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, messages: &[Message]) -> Result<String, LlmError> {
        (self.generate)(messages)
    }

    async fn summarize(&self, messages: &[Message]) -> Result<String, LlmError> {
        match &self.summarize {
            Some(f) => f(messages),
            None => (self.generate)(messages),
        }
    }
}
