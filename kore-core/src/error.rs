//! Error types for the kore core library.

use thiserror::Error;

/// Top-level error type for core kore operations.
#[derive(Error, Debug)]
pub enum KoreError {
    /// The memory store could not complete the operation.
    #[error("Memory store error: {0}")]
    Memory(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, KoreError>;
