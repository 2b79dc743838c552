//! Query complexity classification for the complexity router.
//!
//! The router treats the classifier as opaque: anything implementing
//! [`Classifier`] can be plugged in. [`HeuristicClassifier`] is a zero-cost
//! default built from keyword, length and tool-mention signals.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Discrete complexity level, 0 (trivial) to 3 (hard).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComplexityLevel {
    /// Greetings, acknowledgements, one-word lookups.
    Trivial,
    /// Short single-step requests.
    Simple,
    /// Multi-step or analytical requests.
    Involved,
    /// Long, code-heavy or multi-part work.
    Hard,
}

impl ComplexityLevel {
    /// Numeric level.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            ComplexityLevel::Trivial => 0,
            ComplexityLevel::Simple => 1,
            ComplexityLevel::Involved => 2,
            ComplexityLevel::Hard => 3,
        }
    }

    /// Level for a number; anything above 3 saturates to [`ComplexityLevel::Hard`].
    #[must_use]
    pub fn from_u8(level: u8) -> Self {
        match level {
            0 => ComplexityLevel::Trivial,
            1 => ComplexityLevel::Simple,
            2 => ComplexityLevel::Involved,
            _ => ComplexityLevel::Hard,
        }
    }
}

impl fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// A classifier verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Assigned level.
    pub level: ComplexityLevel,
    /// Signals that contributed, in evaluation order.
    pub evidence: Vec<String>,
}

/// A tool the caller can invoke, described for the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name as it would appear in a query.
    pub name: String,
    /// What the tool does.
    pub description: String,
}

impl ToolSpec {
    /// New tool description.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Registered tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCatalog {
    tools: Vec<ToolSpec>,
}

impl ToolCatalog {
    /// Empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool.
    #[must_use]
    pub fn with(mut self, tool: ToolSpec) -> Self {
        self.tools.push(tool);
        self
    }

    /// All tools.
    pub fn iter(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.iter()
    }

    /// Number of tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tools whose name occurs in `query` (case-insensitive).
    #[must_use]
    pub fn mentioned_in(&self, query: &str) -> Vec<&ToolSpec> {
        let lower = query.to_lowercase();
        self.tools
            .iter()
            .filter(|t| !t.name.is_empty() && lower.contains(&t.name.to_lowercase()))
            .collect()
    }
}

/// Maps a query and tool catalog to a complexity level.
pub trait Classifier: Send + Sync {
    /// Classify `query` against `catalog`.
    fn classify(&self, query: &str, catalog: &ToolCatalog) -> Classification;
}

/// Exact-match greetings and acknowledgements.
const SIMPLE_EXACT: &[&str] = &[
    "hi", "hello", "hey", "thanks", "thank you", "bye", "ok", "okay", "yes", "no", "sure",
    "cool", "nice", "yep", "nope", "yeah",
];

/// Substrings that indicate multi-step work.
const COMPLEX_INDICATORS: &[&str] = &[
    "analyze", "compare", "evaluate", "implement", "design", "architecture", "trade-off",
    "tradeoff", "pros and cons", "step by step", "explain in detail", "debug", "refactor",
    "prove", "optimize", "algorithm", "in depth", "comprehensive",
];

/// Tool mentions count at most this many points.
const MAX_TOOL_SCORE: i32 = 2;

/// Keyword/length/tool-mention heuristic.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    /// New classifier.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn score_to_level(score: i32) -> ComplexityLevel {
        match score {
            i32::MIN..=0 => ComplexityLevel::Trivial,
            1 => ComplexityLevel::Simple,
            2 | 3 => ComplexityLevel::Involved,
            _ => ComplexityLevel::Hard,
        }
    }
}

impl Classifier for HeuristicClassifier {
    fn classify(&self, query: &str, catalog: &ToolCatalog) -> Classification {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Classification {
                level: ComplexityLevel::Trivial,
                evidence: vec!["empty query".into()],
            };
        }

        let lower = trimmed.to_lowercase();
        let mut score: i32 = 0;
        let mut evidence = Vec::new();

        let words = trimmed.split_whitespace().count();
        if words <= 4 {
            score -= 1;
            evidence.push(format!("short query ({words} words)"));
        } else if words >= 40 {
            score += 2;
            evidence.push(format!("long query ({words} words)"));
        } else if words >= 15 {
            score += 1;
            evidence.push(format!("medium-length query ({words} words)"));
        }

        if SIMPLE_EXACT.iter().any(|p| lower == *p) {
            score -= 2;
            evidence.push("greeting or acknowledgement".into());
        }

        let indicators: Vec<&str> = COMPLEX_INDICATORS
            .iter()
            .copied()
            .filter(|c| lower.contains(c))
            .collect();
        if !indicators.is_empty() {
            score += if indicators.len() >= 2 { 3 } else { 2 };
            evidence.extend(indicators.iter().map(|c| format!("complex indicator: {c}")));
        }

        let mut tool_score = 0;
        for tool in catalog.mentioned_in(&lower) {
            evidence.push(format!("mentions tool: {}", tool.name));
            tool_score += 1;
        }
        score += tool_score.min(MAX_TOOL_SCORE);

        if trimmed.contains("```") {
            score += 2;
            evidence.push("contains code block".into());
        }

        if trimmed.matches('?').count() >= 2 {
            score += 1;
            evidence.push("multiple questions".into());
        }

        Classification {
            level: Self::score_to_level(score),
            evidence,
        }
    }
}
