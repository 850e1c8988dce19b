//! In-process idempotency store.
//!
//! Records expire lazily on read and are also reclaimed by a periodic sweeper
//! so abandoned keys do not accumulate. Only suitable for a single process.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::error::IdempotencyError;
use super::store::IdempotencyStore;
use super::types::IdempotencyRecord;

struct StoredRecord {
    record: IdempotencyRecord,
    expires_at: Instant,
}

impl StoredRecord {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// `DashMap`-backed store.
#[derive(Default)]
pub struct MemoryIdempotencyStore {
    entries: DashMap<String, StoredRecord>,
}

impl MemoryIdempotencyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no records are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every expired record and returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, stored| !stored.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Spawns a task sweeping the store every `interval` until aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = store.sweep();
                if removed > 0 {
                    tracing::debug!(removed, "Swept expired idempotency records");
                }
            }
        })
    }
}

#[async_trait]
impl IdempotencyStore for MemoryIdempotencyStore {
    async fn get(&self, key: &str) -> Result<Option<IdempotencyRecord>, IdempotencyError> {
        let now = Instant::now();
        // The read guard must be dropped before remove_if takes the shard lock.
        let live = match self.entries.get(key) {
            Some(stored) if !stored.is_expired(now) => Some(stored.record.clone()),
            Some(_) => None,
            None => return Ok(None),
        };

        if live.is_none() {
            self.entries
                .remove_if(key, |_, stored| stored.is_expired(now));
        }
        Ok(live)
    }

    async fn set(
        &self,
        key: &str,
        record: &IdempotencyRecord,
        ttl: Duration,
    ) -> Result<(), IdempotencyError> {
        self.entries.insert(
            key.to_string(),
            StoredRecord {
                record: record.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn set_if_not_exists(
        &self,
        key: &str,
        record: &IdempotencyRecord,
        ttl: Duration,
    ) -> Result<bool, IdempotencyError> {
        let now = Instant::now();
        let stored = StoredRecord {
            record: record.clone(),
            expires_at: now + ttl,
        };

        // The entry guard holds the shard lock, making check-and-insert atomic.
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(stored);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(stored);
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), IdempotencyError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idempotency::types::CachedResponse;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_record_expires_after_ttl() {
        let store = MemoryIdempotencyStore::new();
        store
            .set("idem:global:k1", &IdempotencyRecord::processing(), TTL)
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(store.get("idem:global:k1").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.get("idem:global:k1").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_conditional_insert() {
        let store = MemoryIdempotencyStore::new();
        let record = IdempotencyRecord::processing();

        assert!(store.set_if_not_exists("k", &record, TTL).await.unwrap());
        assert!(!store.set_if_not_exists("k", &record, TTL).await.unwrap());

        tokio::time::advance(TTL).await;
        assert!(store.set_if_not_exists("k", &record, TTL).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_conditional_insert_has_one_winner() {
        let store = Arc::new(MemoryIdempotencyStore::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .set_if_not_exists("race", &IdempotencyRecord::processing(), TTL)
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_overwrites_and_delete_removes() {
        let store = MemoryIdempotencyStore::new();
        store
            .set("k", &IdempotencyRecord::processing(), TTL)
            .await
            .unwrap();

        let completed = IdempotencyRecord::completed(CachedResponse::new(201, vec![], b"{}"));
        store.set("k", &completed, TTL).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(completed));

        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_reclaims_expired_records() {
        let store = Arc::new(MemoryIdempotencyStore::new());
        store
            .set("short", &IdempotencyRecord::processing(), Duration::from_secs(5))
            .await
            .unwrap();
        store
            .set("long", &IdempotencyRecord::processing(), Duration::from_secs(600))
            .await
            .unwrap();

        let sweeper = store.spawn_sweeper(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert_eq!(store.len(), 1);
        sweeper.abort();
    }
}
