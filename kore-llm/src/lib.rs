//! # kore-llm
//!
//! One contract for every text generation backend:
//!   - **Ollama** (local runner, default)
//!   - **OpenAI-compatible API** (hosted)
//!   - **Callables** (closures, test doubles)
//!   - **Routers** that pick one of several named providers per request,
//!     either by a decision function or by query complexity
//!
//! # Routing
//!
//! ```text
//! summarize category + "quality" registered  → quality       (forced)
//! decision function / classifier names route → that route    (unknown = error)
//! otherwise                                  → default route
//! ```

#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod classifier;
pub mod client;
pub mod complexity;
pub mod error;
pub mod provider;
pub mod router;
pub mod types;

pub use classifier::{Classification, Classifier, ComplexityLevel, HeuristicClassifier, ToolCatalog, ToolSpec};
pub use client::{OllamaProvider, OpenAiProvider, UnavailableProvider};
pub use complexity::{ComplexityRouter, LevelRoutes};
pub use error::LlmError;
pub use provider::{CallableProvider, Provider, timed_generate};
pub use router::{RouteTable, Router, by_length};
pub use types::{Message, ProviderResult, Role};
