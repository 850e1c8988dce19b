//! Storage interface for idempotency records.

use std::time::Duration;

use async_trait::async_trait;

use super::error::IdempotencyError;
use super::types::IdempotencyRecord;

/// Key-value store holding idempotency records with per-key expiry.
///
/// Implementations must make [`set_if_not_exists`](Self::set_if_not_exists)
/// atomic: of any number of concurrent callers for one key, exactly one
/// observes `true`.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Returns the live record for `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<IdempotencyRecord>, IdempotencyError>;

    /// Writes `record` unconditionally with the given time to live.
    async fn set(
        &self,
        key: &str,
        record: &IdempotencyRecord,
        ttl: Duration,
    ) -> Result<(), IdempotencyError>;

    /// Writes `record` only if no live record exists. Returns whether it was written.
    async fn set_if_not_exists(
        &self,
        key: &str,
        record: &IdempotencyRecord,
        ttl: Duration,
    ) -> Result<bool, IdempotencyError>;

    /// Removes the record for `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), IdempotencyError>;
}
