//! Idempotency error types.

use thiserror::Error;

/// Errors raised by the idempotency gateway and its stores.
#[derive(Debug, Error)]
pub enum IdempotencyError {
    /// The `Idempotency-Key` header is malformed.
    #[error("Invalid Idempotency-Key: {0}")]
    InvalidKey(String),

    /// A request with the same key is still being processed.
    #[error("A request with this Idempotency-Key is already being processed")]
    KeyInUse,

    /// The backing store failed.
    #[error("Idempotency store error: {0}")]
    Store(String),

    /// A record could not be encoded or decoded.
    #[error("Idempotency record serialization error: {0}")]
    Serialization(String),
}

impl IdempotencyError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidKey(_) => "INVALID_IDEMPOTENCY_KEY",
            Self::KeyInUse => "IDEMPOTENCY_KEY_IN_USE",
            Self::Store(_) | Self::Serialization(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidKey(_) => 400,
            Self::KeyInUse => 409,
            Self::Store(_) | Self::Serialization(_) => 500,
        }
    }
}

impl From<serde_json::Error> for IdempotencyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<redis::RedisError> for IdempotencyError {
    fn from(err: redis::RedisError) -> Self {
        Self::Store(err.to_string())
    }
}
