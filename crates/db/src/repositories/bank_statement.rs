//! Bank statement repository: recording statements and linking entries.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set,
};
use serde::Serialize;
use serde_json::json;
use tally_core::ledger::reconciliation::{reconcile, validate_statement_request};
use tally_core::ledger::{AuditAction, AuditRecord, LedgerError, RecordBankStatementInput};
use tally_shared::types::{AccountId, OrganizationId, UserId};
use uuid::Uuid;

use super::audit::AuditRepository;
use super::entry::to_entry_line;
use super::error::RepositoryError;
use crate::entities::{bank_accounts, bank_statements, entries, entry_lines};

/// A recorded statement and the entries linked to it.
#[derive(Debug, Clone, Serialize)]
pub struct RecordedStatement {
    /// The statement.
    #[serde(flatten)]
    pub statement: bank_statements::Model,
    /// Linked entry IDs, in request order.
    pub entry_ids: Vec<Uuid>,
}

/// Bank statement repository.
pub struct BankStatementRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> BankStatementRepository<'a, C> {
    /// Creates a repository over `conn`.
    #[must_use]
    pub const fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Records a statement and links the given entries to it.
    ///
    /// The declared closing balance must equal the opening balance plus the
    /// net movement of the linked entries on the bank's ledger account.
    /// Nothing is written unless it does.
    ///
    /// # Errors
    ///
    /// Returns `BankAccountNotFound`, `EntryNotFound`,
    /// `EntryAlreadyReconciled`, `StatementBalanceMismatch`, or a request
    /// shape error.
    pub async fn record(
        &self,
        organization_id: OrganizationId,
        actor: UserId,
        input: RecordBankStatementInput,
    ) -> Result<RecordedStatement, RepositoryError> {
        validate_statement_request(
            input.period_start,
            input.period_end,
            input.opening_balance,
            input.closing_balance,
            &input.entry_ids,
        )?;

        let bank_account = bank_accounts::Entity::find_by_id(input.bank_account_id.into_inner())
            .one(self.conn)
            .await?
            .ok_or(LedgerError::BankAccountNotFound(
                input.bank_account_id.into_inner(),
            ))?;

        let ids: Vec<Uuid> = input.entry_ids.iter().map(|id| id.into_inner()).collect();

        // Row locks keep a concurrent statement from claiming the same entries.
        let found: HashMap<Uuid, entries::Model> = if ids.is_empty() {
            HashMap::new()
        } else {
            entries::Entity::find()
                .filter(entries::Column::Id.is_in(ids.clone()))
                .lock_exclusive()
                .all(self.conn)
                .await?
                .into_iter()
                .map(|entry| (entry.id, entry))
                .collect()
        };

        for id in &ids {
            let entry = found.get(id).ok_or(LedgerError::EntryNotFound(*id))?;
            if entry.bank_statement_id.is_some() {
                return Err(LedgerError::EntryAlreadyReconciled(*id).into());
            }
        }

        let lines = if ids.is_empty() {
            Vec::new()
        } else {
            entry_lines::Entity::find()
                .filter(entry_lines::Column::EntryId.is_in(ids.clone()))
                .all(self.conn)
                .await?
        };
        let lines: Vec<_> = lines.iter().map(to_entry_line).collect();

        reconcile(
            input.opening_balance,
            input.closing_balance,
            AccountId::from_uuid(bank_account.account_id),
            &lines,
        )?;

        let statement = bank_statements::ActiveModel {
            id: Set(Uuid::now_v7()),
            organization_id: Set(organization_id.into_inner()),
            bank_account_id: Set(bank_account.id),
            period_start: Set(input.period_start),
            period_end: Set(input.period_end),
            opening_balance: Set(input.opening_balance),
            closing_balance: Set(input.closing_balance),
            created_by: Set(actor.into_inner()),
            created_at: Set(Utc::now().fixed_offset()),
        }
        .insert(self.conn)
        .await?;

        if !ids.is_empty() {
            entries::Entity::update_many()
                .col_expr(entries::Column::BankStatementId, Expr::value(statement.id))
                .filter(entries::Column::Id.is_in(ids.clone()))
                .exec(self.conn)
                .await?;
        }

        AuditRepository::new(self.conn)
            .append(
                organization_id,
                AuditRecord::new(
                    actor,
                    AuditAction::BankStatementRecord,
                    statement.id,
                    json!({
                        "bank_account_id": bank_account.id,
                        "closing_balance": statement.closing_balance,
                        "entry_ids": ids,
                    }),
                ),
            )
            .await?;

        tracing::info!(
            %organization_id,
            statement_id = %statement.id,
            entries = ids.len(),
            "Bank statement recorded"
        );

        Ok(RecordedStatement {
            statement,
            entry_ids: ids,
        })
    }
}
