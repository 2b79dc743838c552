//! Bridge error types.

use kore_core::KoreError;
use kore_llm::LlmError;
use thiserror::Error;

/// Errors surfaced by [`crate::Bridge`] and [`crate::Experiment`].
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The provider failed: unreachable, timed out or returned unusable output.
    #[error("provider error: {0}")]
    Provider(#[source] LlmError),

    /// A router was asked for a route it does not have.
    #[error("routing error: no provider registered for route '{route}'")]
    Routing {
        /// Route name that was requested.
        route: String,
    },

    /// The query repeated too often and nothing could be served in its place.
    #[error("rate limit exceeded for user '{user}' (query {query_hash})")]
    RateLimitExceeded {
        /// User the limit applies to.
        user: String,
        /// Hash of the normalized query.
        query_hash: String,
    },

    /// The memory store failed.
    #[error("memory error: {0}")]
    Memory(#[from] KoreError),

    /// Configuration rejected when the bridge was built.
    #[error("invalid bridge configuration: {0}")]
    Config(String),
}

impl From<LlmError> for BridgeError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::UnknownRoute(route) => BridgeError::Routing { route },
            other => BridgeError::Provider(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_route_maps_to_routing() {
        let err = BridgeError::from(LlmError::UnknownRoute("expert".into()));
        assert!(matches!(err, BridgeError::Routing { ref route } if route == "expert"));
    }

    #[test]
    fn backend_failures_map_to_provider() {
        let err = BridgeError::from(LlmError::Timeout(30_000));
        assert!(matches!(err, BridgeError::Provider(LlmError::Timeout(30_000))));
        assert!(err.to_string().contains("timed out"));
    }
}
