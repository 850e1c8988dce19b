//! Error responses.
//!
//! Every error leaves the API as `{"error": CODE, "message": text}`. Server
//! faults are logged with their detail and answered with a generic message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tally_core::idempotency::IdempotencyError;
use tally_core::ledger::LedgerError;
use tally_db::{RepositoryError, TenantTxError};
use tally_shared::AppError;

/// Message sent in place of the detail of any server fault.
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal error occurred";

/// An error ready to be rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Creates an error with an explicit status and code.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// A server fault. `detail` is logged, never sent.
    #[must_use]
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        tracing::error!(error = %detail, "Internal error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            INTERNAL_ERROR_MESSAGE,
        )
    }

    /// The caller's role does not allow the operation.
    #[must_use]
    pub fn insufficient_role(role: &str) -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            "INSUFFICIENT_ROLE",
            format!("Role '{role}' is not allowed to perform this operation"),
        )
    }

    /// HTTP status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    fn from_parts(status: u16, code: &'static str, message: String) -> Self {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            return Self::internal(message);
        }
        Self::new(status, code, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "error": self.code,
                "message": self.message,
            })),
        )
            .into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self::from_parts(err.status_code(), err.error_code(), err.to_string())
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        Self::from_parts(err.http_status_code(), err.error_code(), err.to_string())
    }
}

impl From<IdempotencyError> for ApiError {
    fn from(err: IdempotencyError) -> Self {
        Self::from_parts(err.http_status_code(), err.error_code(), err.to_string())
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Ledger(err) => err.into(),
            RepositoryError::Database(err) => Self::internal(err),
        }
    }
}

impl From<TenantTxError> for ApiError {
    fn from(err: TenantTxError) -> Self {
        Self::internal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use uuid::Uuid;

    async fn body_json(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_domain_error_keeps_code_and_message() {
        let id = Uuid::now_v7();
        let (status, body) = body_json(LedgerError::EntryAlreadyLocked(id).into()).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "ENTRY_ALREADY_LOCKED");
        assert_eq!(body["message"], format!("Entry {id} is already locked"));
    }

    #[tokio::test]
    async fn test_server_fault_detail_is_hidden() {
        let (status, body) =
            body_json(LedgerError::Database("connection reset by peer".to_string()).into()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "INTERNAL_ERROR");
        assert_eq!(body["message"], INTERNAL_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_idempotency_conflict() {
        let (status, body) = body_json(IdempotencyError::KeyInUse.into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "IDEMPOTENCY_KEY_IN_USE");
    }

    #[tokio::test]
    async fn test_tenant_locked_maps_to_423() {
        let (status, body) = body_json(AppError::TenantLocked("acme".to_string()).into()).await;
        assert_eq!(status, StatusCode::LOCKED);
        assert_eq!(body["error"], "TENANT_LOCKED");
    }
}
