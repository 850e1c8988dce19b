//! Idempotency middleware.
//!
//! Runs after authentication so keys can be namespaced by the caller's
//! tenant, and before the tenant transaction so a replay never opens one.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderName, HeaderValue, Method, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tally_core::idempotency::{
    Admission, CachedResponse, IDEMPOTENCY_KEY_HEADER, IDEMPOTENT_REPLAYED_HEADER,
    IdempotencyGateway, IdempotencyKey,
};
use tally_shared::Claims;
use tally_shared::types::OrganizationId;

use crate::AppState;
use crate::error::ApiError;

/// Response headers that are recomputed rather than snapshotted.
const SKIPPED_HEADERS: [HeaderName; 3] = [
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::CONNECTION,
];

fn is_mutating(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Deduplicates mutating requests that carry an `Idempotency-Key`.
pub async fn idempotency_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !is_mutating(request.method()) {
        return next.run(request).await;
    }

    let key = match IdempotencyKey::from_header_values(
        request
            .headers()
            .get_all(IDEMPOTENCY_KEY_HEADER)
            .iter()
            .map(HeaderValue::as_bytes),
    ) {
        Ok(Some(key)) => key,
        Ok(None) => return next.run(request).await,
        Err(e) => return ApiError::from(e).into_response(),
    };

    let tenant = request
        .extensions()
        .get::<Claims>()
        .map(|claims| OrganizationId::from_uuid(claims.organization_id()));
    let storage_key = key.storage_key(tenant);
    let gateway = &state.idempotency;

    match gateway.begin(&storage_key).await {
        Ok(Admission::Proceed) => {}
        Ok(Admission::Replay(cached)) => return replay(&key, &cached),
        Err(e) => return ApiError::from(e).into_response(),
    }

    let response = next.run(request).await;
    finalize(gateway, &storage_key, &key, response, state.max_body_bytes).await
}

async fn finalize(
    gateway: &IdempotencyGateway,
    storage_key: &str,
    key: &IdempotencyKey,
    response: Response,
    max_body_bytes: usize,
) -> Response {
    let (mut parts, body) = response.into_parts();

    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            release(gateway, storage_key).await;
            return ApiError::internal(e).into_response();
        }
    };

    if bytes.len() > max_body_bytes {
        tracing::warn!(
            key = %storage_key,
            size = bytes.len(),
            limit = max_body_bytes,
            "Response too large to snapshot, releasing idempotency key"
        );
        release(gateway, storage_key).await;
    } else {
        let headers = parts
            .headers
            .iter()
            .filter(|(name, _)| !SKIPPED_HEADERS.contains(*name))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let snapshot = CachedResponse::new(parts.status.as_u16(), headers, &bytes);

        if let Err(e) = gateway.complete(storage_key, snapshot).await {
            // The handler already ran; the client still gets its response.
            tracing::error!(key = %storage_key, error = %e, "Failed to store idempotent response");
        }
    }

    mark(&mut parts.headers, key, false);
    Response::from_parts(parts, Body::from(bytes))
}

async fn release(gateway: &IdempotencyGateway, storage_key: &str) {
    if let Err(e) = gateway.abandon(storage_key).await {
        tracing::error!(key = %storage_key, error = %e, "Failed to release idempotency key");
    }
}

fn replay(key: &IdempotencyKey, cached: &CachedResponse) -> Response {
    let body = match cached.body_bytes() {
        Ok(body) => body,
        Err(e) => return ApiError::from(e).into_response(),
    };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = axum::http::StatusCode::from_u16(cached.status)
        .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);

    let headers = response.headers_mut();
    for (name, value) in &cached.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.append(name, value);
        }
    }
    mark(headers, key, true);
    response
}

fn mark(headers: &mut axum::http::HeaderMap, key: &IdempotencyKey, replayed: bool) {
    if let Ok(value) = HeaderValue::from_str(key.as_str()) {
        headers.insert(IDEMPOTENCY_KEY_HEADER, value);
    }
    headers.insert(
        IDEMPOTENT_REPLAYED_HEADER,
        HeaderValue::from_static(if replayed { "true" } else { "false" }),
    );
}
