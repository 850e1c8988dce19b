//! Bank statement routes.

use axum::{Json, Router, http::StatusCode, routing::post};
use tally_core::auth::UserRole;
use tally_core::ledger::RecordBankStatementInput;
use tally_db::repositories::{BankStatementRepository, RecordedStatement};

use crate::AppState;
use crate::error::ApiError;
use crate::middleware::{AuthUser, TenantTx};

/// Creates the bank statement routes (requires auth and tenant middleware).
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/organizations/{org_id}/bank-statements",
        post(record_statement),
    )
}

/// POST `/organizations/{org_id}/bank-statements` - Record a statement and
/// reconcile the listed entries against it.
async fn record_statement(
    auth: AuthUser,
    tx: TenantTx,
    Json(input): Json<RecordBankStatementInput>,
) -> Result<(StatusCode, Json<RecordedStatement>), ApiError> {
    auth.require(UserRole::can_reconcile)?;

    let conn = tx.conn().await?;
    let statement = BankStatementRepository::new(&*conn)
        .record(tx.organization_id(), auth.user_id(), input)
        .await?;

    Ok((StatusCode::CREATED, Json(statement)))
}
