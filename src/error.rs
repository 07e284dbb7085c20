//! Error types for the Slidegate engine.

use thiserror::Error;

/// Boxed error type accepted from injected key-derivation callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for Slidegate operations.
#[derive(Error, Debug)]
pub enum SlidegateError {
    /// A configured identity header was absent or blank on the request.
    #[error("the header {0} must have a value set")]
    MissingHeaderValue(String),

    /// A custom key-derivation callback failed; the source is passed
    /// through unchanged.
    #[error("failed to derive rate limiting key: {0}")]
    KeyDerivation(#[source] BoxError),

    /// The configured strategy name does not match any known algorithm.
    #[error("unknown rate limiting strategy: {0}")]
    UnknownStrategy(String),

    /// An operation against the external window store failed.
    #[error("store operation failed for key {key}: {source}")]
    Store {
        /// The rate-limiting key the failed operation was issued for.
        key: String,
        #[source]
        source: BoxError,
    },

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SlidegateError {
    /// Whether this failure was caused by the inbound request itself, as
    /// opposed to the engine or its store. Client-caused failures should be
    /// rejected with a client error; everything else is an internal failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SlidegateError::MissingHeaderValue(_) | SlidegateError::KeyDerivation(_)
        )
    }
}

/// Result type alias for Slidegate operations.
pub type Result<T> = std::result::Result<T, SlidegateError>;
