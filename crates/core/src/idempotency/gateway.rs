//! The idempotency gateway state machine.
//!
//! ```text
//! absent ──reserve──▶ processing ──complete(<500)──▶ completed
//!                         │
//!                         └──complete(>=500) / abandon──▶ absent
//! ```
//!
//! The HTTP layer calls [`IdempotencyGateway::begin`] before running a
//! handler and [`IdempotencyGateway::complete`] afterwards.

use std::sync::Arc;
use std::time::Duration;

use tally_shared::IdempotencyConfig;

use super::error::IdempotencyError;
use super::store::IdempotencyStore;
use super::types::{CachedResponse, IdempotencyRecord};

/// What the caller should do with the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The key was reserved; run the handler.
    Proceed,
    /// The key already completed; replay this snapshot.
    Replay(CachedResponse),
}

/// Deduplicates retried requests by key.
#[derive(Clone)]
pub struct IdempotencyGateway {
    store: Arc<dyn IdempotencyStore>,
    processing_ttl: Duration,
    completed_ttl: Duration,
}

impl IdempotencyGateway {
    /// Creates a gateway over `store`.
    #[must_use]
    pub fn new(
        store: Arc<dyn IdempotencyStore>,
        processing_ttl: Duration,
        completed_ttl: Duration,
    ) -> Self {
        Self {
            store,
            processing_ttl,
            completed_ttl,
        }
    }

    /// Creates a gateway using the TTLs from configuration.
    #[must_use]
    pub fn from_config(store: Arc<dyn IdempotencyStore>, config: &IdempotencyConfig) -> Self {
        Self::new(
            store,
            Duration::from_secs(config.processing_ttl_secs),
            Duration::from_secs(config.completed_ttl_secs),
        )
    }

    /// Checks and reserves `storage_key`.
    ///
    /// # Errors
    ///
    /// Returns `KeyInUse` while another request holds the key, or a store
    /// error.
    pub async fn begin(&self, storage_key: &str) -> Result<Admission, IdempotencyError> {
        if let Some(record) = self.store.get(storage_key).await? {
            return Self::admission_for(storage_key, record);
        }

        let placeholder = IdempotencyRecord::processing();
        if self
            .store
            .set_if_not_exists(storage_key, &placeholder, self.processing_ttl)
            .await?
        {
            tracing::debug!(key = %storage_key, "Reserved idempotency key");
            return Ok(Admission::Proceed);
        }

        // Lost the race; whoever won decides what we see.
        match self.store.get(storage_key).await? {
            Some(record) => Self::admission_for(storage_key, record),
            None => Err(IdempotencyError::KeyInUse),
        }
    }

    /// Finalizes `storage_key` with the handler's response.
    ///
    /// Server faults release the key so the next attempt runs fresh. Any
    /// other status is snapshotted for replay.
    ///
    /// # Errors
    ///
    /// Returns a store error if the record cannot be written or removed.
    pub async fn complete(
        &self,
        storage_key: &str,
        response: CachedResponse,
    ) -> Result<(), IdempotencyError> {
        if response.is_server_fault() {
            tracing::debug!(
                key = %storage_key,
                status = response.status,
                "Releasing idempotency key after server fault"
            );
            return self.store.delete(storage_key).await;
        }

        let status = response.status;
        self.store
            .set(
                storage_key,
                &IdempotencyRecord::completed(response),
                self.completed_ttl,
            )
            .await?;
        tracing::debug!(key = %storage_key, status, "Stored idempotent response");
        Ok(())
    }

    /// Releases `storage_key` without a snapshot.
    ///
    /// # Errors
    ///
    /// Returns a store error if the record cannot be removed.
    pub async fn abandon(&self, storage_key: &str) -> Result<(), IdempotencyError> {
        self.store.delete(storage_key).await
    }

    fn admission_for(
        storage_key: &str,
        record: IdempotencyRecord,
    ) -> Result<Admission, IdempotencyError> {
        match record {
            IdempotencyRecord::Completed { response, .. } => {
                tracing::debug!(key = %storage_key, status = response.status, "Replaying idempotent response");
                Ok(Admission::Replay(response))
            }
            IdempotencyRecord::Processing { .. } => Err(IdempotencyError::KeyInUse),
        }
    }
}
