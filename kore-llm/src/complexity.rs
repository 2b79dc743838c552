//! Complexity router: a classifier picks the route.
//!
//! The query handed to the classifier is the last user message. The
//! level→route mapping has one entry per level and every entry is checked
//! against the route table when the router is built.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use kore_core::config::LevelRoutesConfig;
use parking_lot::Mutex;
use tracing::debug;

use crate::classifier::{Classification, Classifier, ComplexityLevel, HeuristicClassifier, ToolCatalog};
use crate::error::LlmError;
use crate::provider::Provider;
use crate::router::{Category, QUALITY_ROUTE, RouteDecision, RouteReason, RouteTable};
use crate::types::{Message, last_user_content};

/// Route name for each complexity level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelRoutes {
    routes: [String; 4],
}

impl LevelRoutes {
    /// Explicit mapping, index = level.
    #[must_use]
    pub fn new(level_0: &str, level_1: &str, level_2: &str, level_3: &str) -> Self {
        Self {
            routes: [level_0.into(), level_1.into(), level_2.into(), level_3.into()],
        }
    }

    /// Route for `level`.
    #[must_use]
    pub fn route_for(&self, level: ComplexityLevel) -> &str {
        &self.routes[usize::from(level.as_u8())]
    }

    fn validate(&self, table: &RouteTable) -> Result<(), LlmError> {
        match self.routes.iter().find(|r| !table.contains(r)) {
            Some(missing) => Err(LlmError::UnknownRoute(missing.clone())),
            None => Ok(()),
        }
    }
}

impl Default for LevelRoutes {
    fn default() -> Self {
        Self::from(&LevelRoutesConfig::default())
    }
}

impl From<&LevelRoutesConfig> for LevelRoutes {
    fn from(cfg: &LevelRoutesConfig) -> Self {
        Self::new(&cfg.level_0, &cfg.level_1, &cfg.level_2, &cfg.level_3)
    }
}

#[derive(Debug, Default)]
struct LastDispatch {
    route: Option<String>,
    level: Option<ComplexityLevel>,
    classification: Option<Classification>,
}

/// Provider that classifies each query and dispatches by level.
pub struct ComplexityRouter {
    table: RouteTable,
    levels: LevelRoutes,
    classifier: Arc<dyn Classifier>,
    catalog: ToolCatalog,
    last: Mutex<LastDispatch>,
}

impl ComplexityRouter {
    /// Build over `table` with the built-in heuristic classifier.
    ///
    /// # Errors
    /// `LlmError::ConfigError` for an empty table; `LlmError::UnknownRoute`
    /// if a level maps to an unregistered route.
    pub fn new(table: RouteTable, levels: LevelRoutes) -> Result<Self, LlmError> {
        Self::with_classifier(table, levels, Arc::new(HeuristicClassifier::new()))
    }

    /// Build with a custom classifier.
    ///
    /// # Errors
    /// Same as [`ComplexityRouter::new`].
    pub fn with_classifier(
        table: RouteTable,
        levels: LevelRoutes,
        classifier: Arc<dyn Classifier>,
    ) -> Result<Self, LlmError> {
        if table.is_empty() {
            return Err(LlmError::ConfigError("complexity router needs at least one route".into()));
        }
        levels.validate(&table)?;
        Ok(Self {
            table,
            levels,
            classifier,
            catalog: ToolCatalog::new(),
            last: Mutex::new(LastDispatch::default()),
        })
    }

    /// Tools the classifier sees.
    #[must_use]
    pub fn with_catalog(mut self, catalog: ToolCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Route chosen by the most recent dispatch.
    #[must_use]
    pub fn last_route(&self) -> Option<String> {
        self.last.lock().route.clone()
    }

    /// Level of the most recent classified dispatch. `None` before the first
    /// dispatch and after a summarize forced onto `quality`.
    #[must_use]
    pub fn last_sc_level(&self) -> Option<ComplexityLevel> {
        self.last.lock().level
    }

    /// Full classifier verdict of the most recent classified dispatch.
    #[must_use]
    pub fn last_classification(&self) -> Option<Classification> {
        self.last.lock().classification.clone()
    }

    /// Classify `messages` and pick a route without dispatching.
    #[must_use]
    pub fn select(&self, category: Category, messages: &[Message]) -> (RouteDecision, Option<Classification>) {
        if category == Category::Summarize && self.table.contains(QUALITY_ROUTE) {
            let decision = RouteDecision {
                route: QUALITY_ROUTE.to_string(),
                reason: RouteReason::ForcedQuality,
            };
            return (decision, None);
        }
        let classification = self.classifier.classify(last_user_content(messages), &self.catalog);
        let decision = RouteDecision {
            route: self.levels.route_for(classification.level).to_string(),
            reason: RouteReason::Decided,
        };
        (decision, Some(classification))
    }

    async fn dispatch(&self, category: Category, messages: &[Message]) -> Result<String, LlmError> {
        let (decision, classification) = self.select(category, messages);
        let provider = Arc::clone(self.table.get(&decision.route)?);
        let level = classification.as_ref().map(|c| c.level);
        debug!(
            route = %decision.route,
            level = level.map(ComplexityLevel::as_u8),
            ?category,
            "complexity router dispatch"
        );
        {
            let mut last = self.last.lock();
            last.route = Some(decision.route);
            last.level = level;
            last.classification = classification;
        }
        match category {
            Category::Generate => provider.generate(messages).await,
            Category::Summarize => provider.summarize(messages).await,
        }
    }
}

impl fmt::Debug for ComplexityRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComplexityRouter")
            .field("routes", &self.table)
            .field("levels", &self.levels)
            .field("tools", &self.catalog.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Provider for ComplexityRouter {
    fn name(&self) -> &str {
        "complexity-router"
    }

    async fn generate(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.dispatch(Category::Generate, messages).await
    }

    async fn summarize(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.dispatch(Category::Summarize, messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::CallableProvider;

    fn labelled(label: &'static str) -> CallableProvider {
        CallableProvider::infallible(label, move |_| label.to_string())
    }

    fn table() -> RouteTable {
        RouteTable::new().route("fast", labelled("fast")).route("quality", labelled("quality"))
    }

    struct Fixed(ComplexityLevel);

    impl Classifier for Fixed {
        fn classify(&self, _query: &str, _catalog: &ToolCatalog) -> Classification {
            Classification {
                level: self.0,
                evidence: vec!["fixed".into()],
            }
        }
    }

    #[tokio::test]
    async fn level_zero_goes_fast() {
        let router = ComplexityRouter::new(table(), LevelRoutes::default()).expect("router");
        assert_eq!(router.last_sc_level(), None);
        let out = router.generate(&[Message::user("hi")]).await.expect("generate");
        assert_eq!(out, "fast");
        assert_eq!(router.last_sc_level(), Some(ComplexityLevel::Trivial));
        assert_eq!(router.last_route().as_deref(), Some("fast"));
    }

    #[tokio::test]
    async fn hard_query_goes_quality() {
        let router = ComplexityRouter::new(table(), LevelRoutes::default()).expect("router");
        let query = "Explain in detail how to design and implement a lock-free queue, comparing trade-offs step by step";
        let out = router.generate(&[Message::user(query)]).await.expect("generate");
        assert_eq!(out, "quality");
        let classification = router.last_classification().expect("classification");
        assert_eq!(classification.level, ComplexityLevel::Hard);
        assert!(!classification.evidence.is_empty());
    }

    #[tokio::test]
    async fn custom_classifier_is_consulted() {
        let router = ComplexityRouter::with_classifier(
            table(),
            LevelRoutes::default(),
            Arc::new(Fixed(ComplexityLevel::Involved)),
        )
        .expect("router");
        let out = router.generate(&[Message::user("hi")]).await.expect("generate");
        assert_eq!(out, "quality");
        assert_eq!(router.last_sc_level(), Some(ComplexityLevel::Involved));
    }

    #[tokio::test]
    async fn summarize_forces_quality_without_classifying() {
        let router = ComplexityRouter::with_classifier(
            table(),
            LevelRoutes::default(),
            Arc::new(Fixed(ComplexityLevel::Trivial)),
        )
        .expect("router");
        let out = router.summarize(&[Message::user("notes")]).await.expect("summarize");
        assert_eq!(out, "quality");
        assert_eq!(router.last_sc_level(), None);
        assert_eq!(router.last_route().as_deref(), Some("quality"));
    }

    #[test]
    fn unmapped_level_route_rejected_at_build() {
        let levels = LevelRoutes::new("fast", "fast", "quality", "expert");
        let err = ComplexityRouter::new(table(), levels).expect_err("must fail");
        assert!(matches!(err, LlmError::UnknownRoute(ref r) if r == "expert"));
    }

    #[test]
    fn levels_from_config() {
        let cfg = LevelRoutesConfig {
            level_0: "a".into(),
            level_1: "b".into(),
            level_2: "c".into(),
            level_3: "d".into(),
        };
        let levels = LevelRoutes::from(&cfg);
        assert_eq!(levels.route_for(ComplexityLevel::Simple), "b");
        assert_eq!(levels.route_for(ComplexityLevel::Hard), "d");
    }
}
