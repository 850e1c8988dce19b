//! Request middleware, applied in this order: auth, idempotency, tenant.

pub mod auth;
pub mod idempotency;
pub mod tenant;

pub use auth::{AuthUser, auth_middleware};
pub use idempotency::idempotency_middleware;
pub use tenant::{TenantTx, tenant_middleware};
