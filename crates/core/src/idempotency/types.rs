//! Idempotency records and response snapshots.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::IdempotencyError;

/// Lifecycle state of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdempotencyStatus {
    /// A handler is running for this key.
    Processing,
    /// The response has been snapshotted.
    Completed,
}

/// How a snapshotted body is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyEncoding {
    /// Body is valid UTF-8 and stored as-is.
    Utf8,
    /// Body is binary and stored base64-encoded.
    Base64,
}

/// A response snapshot, replayed verbatim on retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers in order, repeated names allowed.
    pub headers: Vec<(String, String)>,
    /// Body, encoded per `body_encoding`.
    pub body: String,
    /// Body encoding flag.
    pub body_encoding: BodyEncoding,
}

impl CachedResponse {
    /// Snapshots a response, base64-encoding the body when it is not UTF-8.
    #[must_use]
    pub fn new(status: u16, headers: Vec<(String, String)>, body: &[u8]) -> Self {
        let (body, body_encoding) = match std::str::from_utf8(body) {
            Ok(text) => (text.to_string(), BodyEncoding::Utf8),
            Err(_) => (STANDARD.encode(body), BodyEncoding::Base64),
        };
        Self {
            status,
            headers,
            body,
            body_encoding,
        }
    }

    /// Returns the original body bytes.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` when a base64 body cannot be decoded.
    pub fn body_bytes(&self) -> Result<Vec<u8>, IdempotencyError> {
        match self.body_encoding {
            BodyEncoding::Utf8 => Ok(self.body.as_bytes().to_vec()),
            BodyEncoding::Base64 => STANDARD
                .decode(&self.body)
                .map_err(|e| IdempotencyError::Serialization(e.to_string())),
        }
    }

    /// Returns true for server faults, which are never cached.
    #[must_use]
    pub fn is_server_fault(&self) -> bool {
        self.status >= 500
    }
}

/// A stored idempotency record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum IdempotencyRecord {
    /// Placeholder reserved before the handler runs.
    Processing {
        /// When the key was reserved.
        created_at: DateTime<Utc>,
    },
    /// Finalized record carrying the response snapshot.
    Completed {
        /// When the key was reserved.
        created_at: DateTime<Utc>,
        /// The snapshotted response.
        response: CachedResponse,
    },
}

impl IdempotencyRecord {
    /// A fresh `processing` placeholder.
    #[must_use]
    pub fn processing() -> Self {
        Self::Processing {
            created_at: Utc::now(),
        }
    }

    /// A `completed` record for `response`.
    #[must_use]
    pub fn completed(response: CachedResponse) -> Self {
        Self::Completed {
            created_at: Utc::now(),
            response,
        }
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn status(&self) -> IdempotencyStatus {
        match self {
            Self::Processing { .. } => IdempotencyStatus::Processing,
            Self::Completed { .. } => IdempotencyStatus::Completed,
        }
    }

    /// Returns when the key was reserved.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::Processing { created_at } | Self::Completed { created_at, .. } => *created_at,
        }
    }
}
