//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes for the ledger write path
//! - Authentication, idempotency and tenant transaction middleware
//! - Error-to-response mapping

pub mod error;
pub mod middleware;
pub mod routes;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;
use tally_core::idempotency::IdempotencyGateway;
use tally_shared::JwtService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// JWT service for token verification.
    pub jwt_service: Arc<JwtService>,
    /// Idempotency gateway over the store chosen at startup.
    pub idempotency: IdempotencyGateway,
    /// Upper bound on a request's tenant transaction.
    pub tenant_tx_timeout: Option<Duration>,
    /// Largest response body the idempotency gateway snapshots.
    pub max_body_bytes: usize,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tally_core::idempotency::MemoryIdempotencyStore;
    use tally_shared::JwtConfig;

    pub const TEST_SECRET: &str = "test-secret-key-for-testing";

    /// State with no database behind it, for middleware that fails fast.
    pub fn test_state() -> AppState {
        test_state_with_db(DatabaseConnection::Disconnected)
    }

    /// State over `db`, typically a mock connection.
    pub fn test_state_with_db(db: DatabaseConnection) -> AppState {
        AppState {
            db: Arc::new(db),
            jwt_service: Arc::new(JwtService::new(JwtConfig {
                secret: TEST_SECRET.to_string(),
                access_token_expires_minutes: 15,
            })),
            idempotency: IdempotencyGateway::new(
                Arc::new(MemoryIdempotencyStore::new()),
                Duration::from_secs(60),
                Duration::from_secs(3600),
            ),
            tenant_tx_timeout: Some(Duration::from_secs(30)),
            max_body_bytes: 1024 * 1024,
        }
    }
}
