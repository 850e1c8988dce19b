//! API route definitions.

use axum::{Router, middleware::from_fn_with_state};
use tower::ServiceBuilder;

use crate::AppState;
use crate::middleware::{auth_middleware, idempotency_middleware, tenant_middleware};

pub mod bank_statements;
pub mod entries;
pub mod fiscal;
pub mod health;

/// Creates the API router.
///
/// Protected routes run through auth, then idempotency, then the tenant
/// transaction, in that order.
#[allow(clippy::needless_pass_by_value)]
pub fn api_routes(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .merge(entries::routes())
        .merge(fiscal::routes())
        .merge(bank_statements::routes())
        .layer(
            ServiceBuilder::new()
                .layer(from_fn_with_state(state.clone(), auth_middleware))
                .layer(from_fn_with_state(state.clone(), idempotency_middleware))
                .layer(from_fn_with_state(state, tenant_middleware)),
        );

    Router::new()
        .merge(health::routes())
        .merge(protected_routes)
}
