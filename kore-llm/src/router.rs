//! Routing provider: picks one of several named providers per request.
//!
//! Selection is a fixed-priority decision table:
//! 1. the "summarize" category goes to the `quality` route when one exists
//! 2. a caller-supplied decision function names the route
//! 3. otherwise the default route
//!
//! A decision function naming an unregistered route is a routing error; it
//! never falls through to the default.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use kore_core::config::RoutingConfig;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::LlmError;
use crate::provider::Provider;
use crate::types::{Message, total_content_len};

/// Route forced for the summarize category.
pub const QUALITY_ROUTE: &str = "quality";
/// Route the length decision picks for short conversations.
pub const FAST_ROUTE: &str = "fast";

/// Operation category a dispatch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Ordinary generation.
    Generate,
    /// Summaries (reflection); forced onto the quality route.
    Summarize,
}

/// Caller-supplied route decision over the full message sequence.
pub type RouteFn = Arc<dyn Fn(&[Message]) -> String + Send + Sync>;

/// Decision function: total content shorter than `threshold` chars → `fast`,
/// otherwise `quality`.
#[must_use]
pub fn by_length(threshold: usize) -> RouteFn {
    Arc::new(move |messages: &[Message]| {
        if total_content_len(messages) < threshold {
            FAST_ROUTE.to_string()
        } else {
            QUALITY_ROUTE.to_string()
        }
    })
}

/// Why a route was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteReason {
    /// Summarize category forced onto `quality`.
    ForcedQuality,
    /// The decision function (or classifier) named it.
    Decided,
    /// Nothing else applied.
    Default,
}

/// Outcome of route selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    /// Chosen route name.
    pub route: String,
    /// Which rule chose it.
    pub reason: RouteReason,
}

/// Named providers in registration order.
#[derive(Clone, Default)]
pub struct RouteTable {
    providers: HashMap<String, Arc<dyn Provider>>,
    order: Vec<String>,
}

impl RouteTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under `name`. Re-registering a name replaces the
    /// provider but keeps its original position.
    #[must_use]
    pub fn route<P: Provider + 'static>(self, name: impl Into<String>, provider: P) -> Self {
        self.route_arc(name, Arc::new(provider))
    }

    /// Register an already shared provider.
    #[must_use]
    pub fn route_arc(mut self, name: impl Into<String>, provider: Arc<dyn Provider>) -> Self {
        let name = name.into();
        if !self.providers.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.providers.insert(name, provider);
        self
    }

    /// Provider for `name`.
    ///
    /// # Errors
    /// Returns `LlmError::UnknownRoute` if nothing is registered under `name`.
    pub fn get(&self, name: &str) -> Result<&Arc<dyn Provider>, LlmError> {
        self.providers
            .get(name)
            .ok_or_else(|| LlmError::UnknownRoute(name.to_string()))
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Route names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// First registered route.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.order.first().map(String::as_str)
    }

    /// Number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.order.iter()).finish()
    }
}

/// Provider that dispatches to one of several named providers.
pub struct Router {
    table: RouteTable,
    default_route: String,
    route_fn: Option<RouteFn>,
    last_route: Mutex<Option<String>>,
}

impl Router {
    /// Build a router over `table`. The first registered route is the default.
    ///
    /// # Errors
    /// Returns `LlmError::ConfigError` if `table` is empty.
    pub fn new(table: RouteTable) -> Result<Self, LlmError> {
        let default_route = table
            .first()
            .ok_or_else(|| LlmError::ConfigError("router needs at least one route".into()))?
            .to_string();
        Ok(Self {
            table,
            default_route,
            route_fn: None,
            last_route: Mutex::new(None),
        })
    }

    /// Build from `[routing]` config: the configured default route, and the
    /// length decision when both `fast` and `quality` are registered.
    ///
    /// # Errors
    /// Same as [`Router::new`] and [`Router::with_default`].
    pub fn from_config(table: RouteTable, cfg: &RoutingConfig) -> Result<Self, LlmError> {
        let mut router = Self::new(table)?;
        if let Some(default_route) = &cfg.default_route {
            router = router.with_default(default_route)?;
        }
        if router.table.contains(FAST_ROUTE) && router.table.contains(QUALITY_ROUTE) {
            router = router.with_shared_route_fn(by_length(cfg.length_threshold));
        }
        Ok(router)
    }

    /// Use `name` as the default route.
    ///
    /// # Errors
    /// Returns `LlmError::ConfigError` if `name` is not registered.
    pub fn with_default(mut self, name: &str) -> Result<Self, LlmError> {
        if !self.table.contains(name) {
            return Err(LlmError::ConfigError(format!("default route '{name}' is not registered")));
        }
        self.default_route = name.to_string();
        Ok(self)
    }

    /// Install a decision function.
    #[must_use]
    pub fn with_route_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&[Message]) -> String + Send + Sync + 'static,
    {
        self.route_fn = Some(Arc::new(f));
        self
    }

    /// Install a shared decision function, e.g. [`by_length`].
    #[must_use]
    pub fn with_shared_route_fn(mut self, f: RouteFn) -> Self {
        self.route_fn = Some(f);
        self
    }

    /// Route chosen by the most recent dispatch; `None` before the first one.
    #[must_use]
    pub fn last_route(&self) -> Option<String> {
        self.last_route.lock().clone()
    }

    /// The default route.
    #[must_use]
    pub fn default_route(&self) -> &str {
        &self.default_route
    }

    /// Registered routes.
    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.table
    }

    /// Evaluate the decision table without dispatching.
    #[must_use]
    pub fn select(&self, category: Category, messages: &[Message]) -> RouteDecision {
        if category == Category::Summarize && self.table.contains(QUALITY_ROUTE) {
            return RouteDecision {
                route: QUALITY_ROUTE.to_string(),
                reason: RouteReason::ForcedQuality,
            };
        }
        if category == Category::Generate {
            if let Some(route_fn) = &self.route_fn {
                return RouteDecision {
                    route: route_fn(messages),
                    reason: RouteReason::Decided,
                };
            }
        }
        RouteDecision {
            route: self.default_route.clone(),
            reason: RouteReason::Default,
        }
    }

    async fn dispatch(&self, category: Category, messages: &[Message]) -> Result<String, LlmError> {
        let decision = self.select(category, messages);
        let provider = Arc::clone(self.table.get(&decision.route)?);
        debug!(route = %decision.route, reason = ?decision.reason, ?category, "router dispatch");
        *self.last_route.lock() = Some(decision.route);
        match category {
            Category::Generate => provider.generate(messages).await,
            Category::Summarize => provider.summarize(messages).await,
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.table)
            .field("default_route", &self.default_route)
            .field("route_fn", &self.route_fn.is_some())
            .finish()
    }
}

#[async_trait]
impl Provider for Router {
    fn name(&self) -> &str {
        "router"
    }

    async fn generate(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.dispatch(Category::Generate, messages).await
    }

    async fn summarize(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.dispatch(Category::Summarize, messages).await
    }
}
