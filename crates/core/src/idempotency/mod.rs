//! Idempotent request handling.
//!
//! A client retries a mutating request by resending it with the same
//! `Idempotency-Key`. The first request runs; retries either replay the stored
//! response or are told the original is still in flight.
//!
//! - `key` - header parsing and tenant-namespaced storage keys
//! - `types` - records and response snapshots
//! - `store` - the storage trait, selected once at startup
//! - `memory` / `redis_store` - the two store implementations
//! - `gateway` - the reservation state machine

pub mod error;
pub mod gateway;
pub mod key;
pub mod memory;
pub mod redis_store;
pub mod store;
pub mod types;

pub use error::IdempotencyError;
pub use gateway::{Admission, IdempotencyGateway};
pub use key::{IDEMPOTENCY_KEY_HEADER, IDEMPOTENT_REPLAYED_HEADER, IdempotencyKey, MAX_KEY_LENGTH};
pub use memory::MemoryIdempotencyStore;
pub use redis_store::RedisIdempotencyStore;
pub use store::IdempotencyStore;
pub use types::{BodyEncoding, CachedResponse, IdempotencyRecord, IdempotencyStatus};
