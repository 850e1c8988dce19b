//! Fiscal year repository: lookups, lock/unlock, and compliance exports.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, FromQueryResult,
    QueryFilter, QuerySelect, Set, Statement,
};
use serde_json::json;
use tally_core::ledger::lock::{
    ensure_fiscal_year_exportable, ensure_fiscal_year_lockable, ensure_fiscal_year_unlockable,
};
use tally_core::ledger::{AuditAction, AuditRecord, ExportRow, FiscalYearInfo, LedgerError, build_export};
use tally_shared::types::{FiscalYearId, OrganizationId, UserId};
use uuid::Uuid;

use super::audit::AuditRepository;
use super::error::RepositoryError;
use crate::entities::{compliance_exports, fiscal_years};

const EXPORT_ROWS_SQL: &str = r"
SELECT
    e.date,
    e.reference,
    l.line_no,
    j.code AS journal_code,
    a.code AS account_code,
    p.code AS project_code,
    l.debit,
    l.credit,
    l.label,
    e.memo
FROM entries e
JOIN journals j ON j.id = e.journal_id
JOIN entry_lines l ON l.entry_id = e.id
JOIN accounts a ON a.id = l.account_id
LEFT JOIN projects p ON p.id = l.project_id
WHERE e.fiscal_year_id = $1
ORDER BY e.date, e.reference, l.line_no
";

#[derive(Debug, FromQueryResult)]
struct ExportRowModel {
    date: NaiveDate,
    reference: String,
    line_no: i32,
    journal_code: String,
    account_code: String,
    project_code: Option<String>,
    debit: Decimal,
    credit: Decimal,
    label: Option<String>,
    memo: Option<String>,
}

impl From<ExportRowModel> for ExportRow {
    fn from(row: ExportRowModel) -> Self {
        Self {
            date: row.date,
            reference: row.reference,
            line_no: row.line_no,
            journal_code: row.journal_code,
            account_code: row.account_code,
            project_code: row.project_code,
            debit: row.debit,
            credit: row.credit,
            label: row.label,
            memo: row.memo,
        }
    }
}

/// Converts a fiscal year row into the facts the ledger rules need.
#[must_use]
pub fn fiscal_year_info(model: &fiscal_years::Model) -> FiscalYearInfo {
    FiscalYearInfo {
        id: FiscalYearId::from_uuid(model.id),
        start_date: model.start_date,
        end_date: model.end_date,
        locked_at: model.locked_at.map(|t| t.with_timezone(&Utc)),
    }
}

/// Fiscal year repository.
pub struct FiscalYearRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> FiscalYearRepository<'a, C> {
    /// Creates a repository over `conn`.
    #[must_use]
    pub const fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Finds a fiscal year.
    ///
    /// # Errors
    ///
    /// Returns `FiscalYearNotFound` if it does not exist for the tenant.
    pub async fn find(&self, id: FiscalYearId) -> Result<fiscal_years::Model, RepositoryError> {
        fiscal_years::Entity::find_by_id(id.into_inner())
            .one(self.conn)
            .await?
            .ok_or_else(|| LedgerError::FiscalYearNotFound(id.into_inner()).into())
    }

    /// Finds a fiscal year and holds a share lock on it until the transaction
    /// ends, so a concurrent lock cannot slip in between check and insert.
    ///
    /// # Errors
    ///
    /// Returns `FiscalYearNotFound` if it does not exist for the tenant.
    pub async fn find_for_posting(&self, id: FiscalYearId) -> Result<FiscalYearInfo, RepositoryError> {
        let model = fiscal_years::Entity::find_by_id(id.into_inner())
            .lock_shared()
            .one(self.conn)
            .await?
            .ok_or(LedgerError::FiscalYearNotFound(id.into_inner()))?;
        Ok(fiscal_year_info(&model))
    }

    /// Locks a fiscal year. No entry can be posted into it afterwards.
    ///
    /// # Errors
    ///
    /// Returns `FiscalYearNotFound` or `FiscalYearAlreadyLocked`.
    pub async fn lock(
        &self,
        organization_id: OrganizationId,
        id: FiscalYearId,
        actor: UserId,
    ) -> Result<fiscal_years::Model, RepositoryError> {
        let model = self.find(id).await?;
        ensure_fiscal_year_lockable(id, model.locked_at.map(|t| t.with_timezone(&Utc)))?;

        // Conditional on the unlocked state so concurrent lockers see one winner.
        let now = Utc::now().fixed_offset();
        let result = fiscal_years::Entity::update_many()
            .col_expr(fiscal_years::Column::LockedAt, Expr::value(now))
            .col_expr(fiscal_years::Column::LockedBy, Expr::value(actor.into_inner()))
            .filter(fiscal_years::Column::Id.eq(id.into_inner()))
            .filter(fiscal_years::Column::LockedAt.is_null())
            .exec(self.conn)
            .await?;
        if result.rows_affected == 0 {
            return Err(LedgerError::FiscalYearAlreadyLocked(id.into_inner()).into());
        }

        AuditRepository::new(self.conn)
            .append(
                organization_id,
                AuditRecord::new(
                    actor,
                    AuditAction::FiscalYearLock,
                    id,
                    json!({ "label": model.label }),
                ),
            )
            .await?;

        tracing::info!(%organization_id, fiscal_year_id = %id, "Fiscal year locked");
        self.find(id).await
    }

    /// Unlocks a fiscal year.
    ///
    /// # Errors
    ///
    /// Returns `FiscalYearNotFound` or `FiscalYearNotLocked`.
    pub async fn unlock(
        &self,
        organization_id: OrganizationId,
        id: FiscalYearId,
        actor: UserId,
    ) -> Result<fiscal_years::Model, RepositoryError> {
        let before = self.find(id).await?;
        ensure_fiscal_year_unlockable(id, before.locked_at.map(|t| t.with_timezone(&Utc)))?;

        let result = fiscal_years::Entity::update_many()
            .col_expr(
                fiscal_years::Column::LockedAt,
                Expr::value(Option::<chrono::DateTime<chrono::FixedOffset>>::None),
            )
            .col_expr(fiscal_years::Column::LockedBy, Expr::value(Option::<Uuid>::None))
            .filter(fiscal_years::Column::Id.eq(id.into_inner()))
            .filter(fiscal_years::Column::LockedAt.is_not_null())
            .exec(self.conn)
            .await?;
        if result.rows_affected == 0 {
            return Err(LedgerError::FiscalYearNotLocked(id.into_inner()).into());
        }

        AuditRepository::new(self.conn)
            .append(
                organization_id,
                AuditRecord::new(
                    actor,
                    AuditAction::FiscalYearUnlock,
                    id,
                    json!({
                        "label": before.label,
                        "previously_locked_at": before.locked_at,
                        "previously_locked_by": before.locked_by,
                    }),
                ),
            )
            .await?;

        tracing::info!(%organization_id, fiscal_year_id = %id, "Fiscal year unlocked");
        self.find(id).await
    }

    /// Generates and stores a compliance export of a locked fiscal year.
    ///
    /// # Errors
    ///
    /// Returns `FiscalYearNotFound` or `FiscalYearNotLockedForExport`.
    pub async fn export(
        &self,
        organization_id: OrganizationId,
        id: FiscalYearId,
        actor: UserId,
    ) -> Result<compliance_exports::Model, RepositoryError> {
        let fiscal_year = fiscal_years::Entity::find_by_id(id.into_inner())
            .lock_shared()
            .one(self.conn)
            .await?
            .ok_or(LedgerError::FiscalYearNotFound(id.into_inner()))?;
        ensure_fiscal_year_exportable(id, fiscal_year.locked_at.map(|t| t.with_timezone(&Utc)))?;

        let rows = ExportRowModel::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            EXPORT_ROWS_SQL,
            [id.into_inner().into()],
        ))
        .all(self.conn)
        .await?;

        let document = build_export(rows.into_iter().map(ExportRow::from).collect());
        let row_count = i32::try_from(document.row_count)
            .map_err(|_| LedgerError::Internal("export row count overflows i32".to_string()))?;

        let export = compliance_exports::ActiveModel {
            id: Set(Uuid::now_v7()),
            organization_id: Set(organization_id.into_inner()),
            fiscal_year_id: Set(id.into_inner()),
            content: Set(document.content),
            checksum: Set(document.checksum),
            row_count: Set(row_count),
            generated_by: Set(actor.into_inner()),
            created_at: Set(Utc::now().fixed_offset()),
        }
        .insert(self.conn)
        .await?;

        AuditRepository::new(self.conn)
            .append(
                organization_id,
                AuditRecord::new(
                    actor,
                    AuditAction::FiscalYearExport,
                    id,
                    json!({ "export_id": export.id, "checksum": export.checksum }),
                ),
            )
            .await?;

        tracing::info!(
            %organization_id,
            fiscal_year_id = %id,
            rows = export.row_count,
            checksum = %export.checksum,
            "Compliance export generated"
        );
        Ok(export)
    }
}
