//! # kore-core
//!
//! Shared state for the kore cognitive middleware:
//!
//! - **Fingerprints**: `(user, normalized query)` keys used everywhere
//! - **Response cache**: per-user answers with lazy TTL expiry
//! - **Rate limiter**: rolling-window repeat-query counters
//! - **Memory store**: the contract for the external "mind", plus an
//!   in-process reference implementation
//! - **Config**: `kore.toml` model
//! - **Metrics**: lock-free counters with Prometheus export
//!
//! Cache and limiter state is sharded per key, so concurrent callers only
//! contend when they touch the same `(user, query)` pair.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod rate_limit;
pub mod types;

pub use cache::ResponseCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::KoreConfig;
pub use error::{KoreError, Result};
pub use memory::{InMemoryStore, MemoryStore};
pub use rate_limit::RateLimiter;
pub use types::*;
