//! LLM error types.

use thiserror::Error;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP request failed or the backend answered with an error status.
    #[error("LLM request failed: {0}")]
    RequestFailed(String),

    /// The backend answered, but not with usable text.
    #[error("Malformed LLM response: {0}")]
    MalformedResponse(String),

    /// Request timed out.
    #[error("LLM request timed out after {0}ms")]
    Timeout(u64),

    /// LLM provider is unreachable or not configured.
    #[error("LLM provider unavailable: {0}")]
    Unavailable(String),

    /// Configuration error.
    #[error("LLM configuration error: {0}")]
    ConfigError(String),

    /// A router was asked for a route it does not have.
    #[error("Unknown route: '{0}'")]
    UnknownRoute(String),
}

impl LlmError {
    /// Whether this is a routing failure rather than a backend failure.
    #[must_use]
    pub fn is_routing(&self) -> bool {
        matches!(self, LlmError::UnknownRoute(_))
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(0)
        } else if err.is_connect() {
            LlmError::Unavailable(err.to_string())
        } else if err.is_decode() {
            LlmError::MalformedResponse(err.to_string())
        } else {
            LlmError::RequestFailed(err.to_string())
        }
    }
}
