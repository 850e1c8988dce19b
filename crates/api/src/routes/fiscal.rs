//! Fiscal year routes: lock, unlock and compliance exports.

use axum::{
    Json, Router,
    extract::Path,
    http::StatusCode,
    routing::post,
};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use tally_core::auth::UserRole;
use tally_db::entities::fiscal_years;
use tally_db::repositories::FiscalYearRepository;
use tally_shared::types::{FiscalYearId, OrganizationId};
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;
use crate::middleware::{AuthUser, TenantTx};

/// Creates the fiscal year routes (requires auth and tenant middleware).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/organizations/{org_id}/fiscal-years/{fy_id}/lock",
            post(lock_fiscal_year),
        )
        .route(
            "/organizations/{org_id}/fiscal-years/{fy_id}/unlock",
            post(unlock_fiscal_year),
        )
        .route(
            "/organizations/{org_id}/fiscal-years/{fy_id}/exports",
            post(export_fiscal_year),
        )
}

/// Metadata of a generated compliance export.
#[derive(Debug, Serialize)]
pub struct ExportResponse {
    /// Export ID.
    pub id: Uuid,
    /// Exported fiscal year.
    pub fiscal_year_id: Uuid,
    /// SHA-256 of the content, hex encoded.
    pub checksum: String,
    /// Number of entry lines exported.
    pub row_count: i32,
    /// Generation time.
    pub created_at: DateTime<FixedOffset>,
}

/// POST `/organizations/{org_id}/fiscal-years/{fy_id}/lock`
async fn lock_fiscal_year(
    auth: AuthUser,
    tx: TenantTx,
    Path((_, fiscal_year_id)): Path<(OrganizationId, FiscalYearId)>,
) -> Result<Json<fiscal_years::Model>, ApiError> {
    auth.require(UserRole::can_manage_fiscal_years)?;

    let conn = tx.conn().await?;
    let fiscal_year = FiscalYearRepository::new(&*conn)
        .lock(tx.organization_id(), fiscal_year_id, auth.user_id())
        .await?;

    Ok(Json(fiscal_year))
}

/// POST `/organizations/{org_id}/fiscal-years/{fy_id}/unlock`
async fn unlock_fiscal_year(
    auth: AuthUser,
    tx: TenantTx,
    Path((_, fiscal_year_id)): Path<(OrganizationId, FiscalYearId)>,
) -> Result<Json<fiscal_years::Model>, ApiError> {
    auth.require(UserRole::can_manage_fiscal_years)?;

    let conn = tx.conn().await?;
    let fiscal_year = FiscalYearRepository::new(&*conn)
        .unlock(tx.organization_id(), fiscal_year_id, auth.user_id())
        .await?;

    Ok(Json(fiscal_year))
}

/// POST `/organizations/{org_id}/fiscal-years/{fy_id}/exports`
async fn export_fiscal_year(
    auth: AuthUser,
    tx: TenantTx,
    Path((_, fiscal_year_id)): Path<(OrganizationId, FiscalYearId)>,
) -> Result<(StatusCode, Json<ExportResponse>), ApiError> {
    auth.require(UserRole::can_manage_fiscal_years)?;

    let conn = tx.conn().await?;
    let export = FiscalYearRepository::new(&*conn)
        .export(tx.organization_id(), fiscal_year_id, auth.user_id())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ExportResponse {
            id: export.id,
            fiscal_year_id: export.fiscal_year_id,
            checksum: export.checksum,
            row_count: export.row_count,
            created_at: export.created_at,
        }),
    ))
}
