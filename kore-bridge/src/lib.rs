//! # kore-bridge
//!
//! Connects a memory store to any LLM provider.
//!
//! ```text
//! ┌──────────────────────── Bridge ────────────────────────┐
//! │  RateLimiter ─► ResponseCache ─► context ─► Provider   │
//! │        │              │             ▲          │       │
//! │        ▼              ▼             │          ▼       │
//! │   fallback      cached answer   MemoryStore ◄─ remember│
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `bridge`: `think`, `observe`, `reflect`
//! - `experiment`: A/B comparison of two providers
//! - `prompt`: context and reflection templates
//! - `reflection`: parsing reflection output into an identity snapshot
//! - `telemetry`: tracing subscriber setup

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bridge;
pub mod error;
pub mod experiment;
pub mod prompt;
pub mod reflection;
pub mod telemetry;

pub use bridge::{AnswerSource, Bridge, BridgeBuilder, FallbackSource, ThinkOptions, ThinkOutcome};
pub use error::BridgeError;
pub use experiment::{Experiment, ExperimentResult, Variant};
pub use telemetry::init_tracing;
