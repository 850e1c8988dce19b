//! Tenant transaction middleware.
//!
//! Wraps every request addressed to `/organizations/{org_id}/...` in one
//! tenant-scoped database transaction. The transaction commits when the
//! response is a success and rolls back otherwise.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tally_db::repositories::OrganizationRepository;
use tally_db::{TenantConn, TenantTransaction};
use tally_shared::{AppError, Claims};
use tally_shared::types::OrganizationId;

use crate::AppState;
use crate::error::ApiError;

/// Returns the raw `{org_id}` segment of an `/organizations/{org_id}` path.
fn tenant_segment(path: &str) -> Option<&str> {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    segments.find(|s| *s == "organizations")?;
    segments.next()
}

/// Opens the request's tenant transaction and settles it from the response.
pub async fn tenant_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(segment) = tenant_segment(request.uri().path()) else {
        return next.run(request).await;
    };
    let organization_id = match segment.parse::<OrganizationId>() {
        Ok(id) => id,
        Err(_) => {
            return ApiError::from(AppError::Validation(format!(
                "'{segment}' is not a valid organization id"
            )))
            .into_response();
        }
    };

    let Some(claims) = request.extensions().get::<Claims>() else {
        return ApiError::from(AppError::Unauthorized(
            "Authentication required".to_string(),
        ))
        .into_response();
    };
    if claims.organization_id() != organization_id.into_inner() {
        tracing::warn!(
            user_id = %claims.user_id(),
            token_org = %claims.organization_id(),
            %organization_id,
            "Cross-tenant request rejected"
        );
        return ApiError::from(AppError::Forbidden(
            "Token does not grant access to this organization".to_string(),
        ))
        .into_response();
    }

    match OrganizationRepository::new(state.db.as_ref())
        .find_access(organization_id)
        .await
    {
        Ok(Some(access)) if access.is_locked() => {
            return ApiError::from(AppError::TenantLocked(organization_id.to_string()))
                .into_response();
        }
        Ok(Some(_)) => {}
        Ok(None) => {
            return ApiError::from(AppError::NotFound(format!(
                "Organization {organization_id}"
            )))
            .into_response();
        }
        Err(e) => return ApiError::internal(e).into_response(),
    }

    let tx = match TenantTransaction::begin(
        state.db.clone(),
        organization_id,
        state.tenant_tx_timeout,
    )
    .await
    {
        Ok(tx) => tx,
        Err(e) => return ApiError::from(e).into_response(),
    };

    request.extensions_mut().insert(tx.clone());
    let response = next.run(request).await;

    if response.status().as_u16() < 400 {
        match tx.commit().await {
            Ok(_) => response,
            Err(e) => {
                tracing::error!(%organization_id, error = %e, "Tenant transaction commit failed");
                ApiError::from(e).into_response()
            }
        }
    } else {
        if let Err(e) = tx.rollback().await {
            tracing::error!(%organization_id, error = %e, "Tenant transaction rollback failed");
        }
        response
    }
}

/// Extractor for the request's tenant transaction.
#[derive(Debug, Clone)]
pub struct TenantTx(pub TenantTransaction);

impl TenantTx {
    /// The tenant the transaction is scoped to.
    #[must_use]
    pub fn organization_id(&self) -> OrganizationId {
        self.0.organization_id()
    }

    /// Borrows the scoped connection.
    ///
    /// # Errors
    ///
    /// Returns a server fault if the transaction is no longer ready.
    pub async fn conn(&self) -> Result<TenantConn<'_>, ApiError> {
        self.0.conn().await.map_err(ApiError::from)
    }
}

impl<S> FromRequestParts<S> for TenantTx
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantTransaction>()
            .cloned()
            .map(TenantTx)
            .ok_or_else(|| ApiError::internal("tenant transaction missing from request"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_state, test_state_with_db};
    use sea_orm::{DbBackend, MockDatabase};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tally_db::entities::organizations;
    use axum::http::StatusCode;
    use axum::{Router, body::Body, middleware::from_fn_with_state, routing::post};
    use chrono::{Duration, Utc};
    use http_body_util::BodyExt;
    use rstest::rstest;
    use tower::ServiceExt;
    use uuid::Uuid;

    #[rstest]
    #[case("/organizations/abc/entries", Some("abc"))]
    #[case("/api/v1/organizations/abc", Some("abc"))]
    #[case("/organizations", None)]
    #[case("/health", None)]
    fn test_tenant_segment(#[case] path: &str, #[case] expected: Option<&str>) {
        assert_eq!(tenant_segment(path), expected);
    }

    fn app() -> Router {
        let state = test_state();
        Router::new()
            .route("/organizations/{org_id}/entries", post(|| async { "ok" }))
            .route("/ping", post(|| async { "pong" }))
            .layer(from_fn_with_state(state.clone(), tenant_middleware))
            .with_state(state)
    }

    fn request(uri: &str, token_org: Option<Uuid>) -> Request {
        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        if let Some(org) = token_org {
            request.extensions_mut().insert(Claims::new(
                Uuid::now_v7(),
                org,
                "accountant",
                Utc::now() + Duration::minutes(5),
            ));
        }
        request
    }

    async fn error_code(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        body["error"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_cross_tenant_request_is_forbidden() {
        let path_org = Uuid::now_v7();
        let response = app()
            .oneshot(request(
                &format!("/organizations/{path_org}/entries"),
                Some(Uuid::now_v7()),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(error_code(response).await, "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_malformed_organization_id_is_rejected() {
        let response = app()
            .oneshot(request("/organizations/not-a-uuid/entries", Some(Uuid::now_v7())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_code(response).await, "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_requests_without_tenant_bypass_wrapping() {
        let response = app().oneshot(request("/ping", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_claims_are_unauthorized() {
        let org = Uuid::now_v7();
        let response = app()
            .oneshot(request(&format!("/organizations/{org}/entries"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_handler_never_runs_when_transaction_cannot_open() {
        let org = Uuid::now_v7();
        // The organization lookup succeeds; scoping the transaction then fails
        // because the mock has no result for the `set_config` statement.
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![organizations::Model {
                id: org,
                name: "Acme".to_string(),
                access_locked_at: None,
                created_at: Utc::now().fixed_offset(),
            }]])
            .into_connection();
        let state = test_state_with_db(db);

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let app = Router::new()
            .route(
                "/organizations/{org_id}/entries",
                post(move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        "ok"
                    }
                }),
            )
            .layer(from_fn_with_state(state.clone(), tenant_middleware))
            .with_state(state);

        let response = app
            .oneshot(request(&format!("/organizations/{org}/entries"), Some(org)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_code(response).await, "INTERNAL_ERROR");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
