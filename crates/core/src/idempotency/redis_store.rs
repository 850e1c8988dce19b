//! Redis-backed idempotency store for multi-process deployments.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::error::IdempotencyError;
use super::store::IdempotencyStore;
use super::types::IdempotencyRecord;

/// Store using `SET ... NX PX` for the atomic reservation.
#[derive(Clone)]
pub struct RedisIdempotencyStore {
    redis: ConnectionManager,
}

impl RedisIdempotencyStore {
    /// Wraps an existing connection manager.
    #[must_use]
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    /// Connects to `url`.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the URL is invalid or the server is unreachable.
    pub async fn connect(url: &str) -> Result<Self, IdempotencyError> {
        let client = redis::Client::open(url)?;
        let redis = ConnectionManager::new(client).await?;
        Ok(Self::new(redis))
    }
}

// Redis rejects a zero expiry.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl IdempotencyStore for RedisIdempotencyStore {
    async fn get(&self, key: &str) -> Result<Option<IdempotencyRecord>, IdempotencyError> {
        let raw: Option<String> = self.redis.clone().get(key).await?;
        raw.map(|json| serde_json::from_str(&json).map_err(IdempotencyError::from))
            .transpose()
    }

    async fn set(
        &self,
        key: &str,
        record: &IdempotencyRecord,
        ttl: Duration,
    ) -> Result<(), IdempotencyError> {
        let json = serde_json::to_string(record)?;
        let _: () = self
            .redis
            .clone()
            .pset_ex(key, json, ttl_millis(ttl))
            .await?;
        Ok(())
    }

    async fn set_if_not_exists(
        &self,
        key: &str,
        record: &IdempotencyRecord,
        ttl: Duration,
    ) -> Result<bool, IdempotencyError> {
        let json = serde_json::to_string(record)?;
        let mut conn = self.redis.clone();
        // Nil reply means the key already existed.
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(json)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<(), IdempotencyError> {
        let _: () = self.redis.clone().del(key).await?;
        Ok(())
    }
}
