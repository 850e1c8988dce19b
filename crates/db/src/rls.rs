//! Row-Level Security (RLS) context management.
//!
//! Tenant isolation relies on the transaction-local setting
//! `app.current_organization_id`, which every `tenant_isolation` policy
//! compares against. It is set with `set_config(..., true)` so it is bound
//! to the transaction and vanishes at commit or rollback, leaving nothing
//! behind on the pooled connection.

use sea_orm::{ConnectionTrait, DbBackend, DbErr, Statement};
use tally_shared::types::OrganizationId;

/// Name of the setting read by the RLS policies.
pub const TENANT_SETTING: &str = "app.current_organization_id";

const SET_TENANT_SQL: &str = "SELECT set_config('app.current_organization_id', $1, true)";
const CURRENT_TENANT_SQL: &str =
    "SELECT current_setting('app.current_organization_id', true) AS tenant";

/// Scopes the enclosing transaction to `organization_id`.
///
/// The id is bound as a parameter, never interpolated into SQL text.
///
/// # Errors
///
/// Returns an error if the statement fails.
pub async fn set_tenant_context<C>(conn: &C, organization_id: OrganizationId) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    conn.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        SET_TENANT_SQL,
        [organization_id.to_string().into()],
    ))
    .await?;
    Ok(())
}

/// Reads back the tenant the current transaction is scoped to, if any.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn current_tenant<C>(conn: &C) -> Result<Option<String>, DbErr>
where
    C: ConnectionTrait,
{
    let row = conn
        .query_one(Statement::from_string(
            DbBackend::Postgres,
            CURRENT_TENANT_SQL,
        ))
        .await?;

    match row {
        Some(row) => {
            let tenant: Option<String> = row.try_get("", "tenant")?;
            Ok(tenant.filter(|t| !t.is_empty()))
        }
        None => Ok(None),
    }
}
