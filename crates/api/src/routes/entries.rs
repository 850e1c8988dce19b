//! Entry routes: posting, locking and reversing.

use axum::{
    Json, Router,
    extract::Path,
    http::StatusCode,
    routing::post,
};
use chrono::Utc;
use tally_core::auth::UserRole;
use tally_core::ledger::{CreateEntryInput, ReverseEntryInput};
use tally_db::entities::entries;
use tally_db::repositories::{EntryRepository, EntryWithLines};
use tally_shared::types::{EntryId, OrganizationId};

use crate::AppState;
use crate::error::ApiError;
use crate::middleware::{AuthUser, TenantTx};

/// Creates the entry routes (requires auth and tenant middleware).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/organizations/{org_id}/entries", post(create_entry))
        .route(
            "/organizations/{org_id}/entries/{entry_id}/lock",
            post(lock_entry),
        )
        .route(
            "/organizations/{org_id}/entries/{entry_id}/reverse",
            post(reverse_entry),
        )
}

/// POST `/organizations/{org_id}/entries` - Post a balanced entry.
async fn create_entry(
    auth: AuthUser,
    tx: TenantTx,
    Json(input): Json<CreateEntryInput>,
) -> Result<(StatusCode, Json<EntryWithLines>), ApiError> {
    auth.require(UserRole::can_post_entries)?;

    let conn = tx.conn().await?;
    let entry = EntryRepository::new(&*conn)
        .create(tx.organization_id(), auth.user_id(), input)
        .await?;

    Ok((StatusCode::CREATED, Json(entry)))
}

/// POST `/organizations/{org_id}/entries/{entry_id}/lock` - Lock an entry.
async fn lock_entry(
    auth: AuthUser,
    tx: TenantTx,
    Path((_, entry_id)): Path<(OrganizationId, EntryId)>,
) -> Result<Json<entries::Model>, ApiError> {
    auth.require(UserRole::can_post_entries)?;

    let conn = tx.conn().await?;
    let entry = EntryRepository::new(&*conn)
        .lock(tx.organization_id(), entry_id, auth.user_id())
        .await?;

    Ok(Json(entry))
}

/// POST `/organizations/{org_id}/entries/{entry_id}/reverse` - Post the
/// reversal of an entry. The body is optional.
async fn reverse_entry(
    auth: AuthUser,
    tx: TenantTx,
    Path((_, entry_id)): Path<(OrganizationId, EntryId)>,
    input: Option<Json<ReverseEntryInput>>,
) -> Result<(StatusCode, Json<EntryWithLines>), ApiError> {
    auth.require(UserRole::can_post_entries)?;

    let input = input.map(|Json(input)| input).unwrap_or_default();
    let conn = tx.conn().await?;
    let reversal = EntryRepository::new(&*conn)
        .reverse(
            tx.organization_id(),
            entry_id,
            auth.user_id(),
            input,
            Utc::now().date_naive(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(reversal)))
}
