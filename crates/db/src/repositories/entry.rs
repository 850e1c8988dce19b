//! Entry repository: posting, locking and reversing entries.
//!
//! Every method runs on the caller's connection, normally the request's
//! tenant transaction, so the sequence allocation, the entry, its lines and
//! the audit record commit or roll back together.

use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::Serialize;
use serde_json::json;
use tally_core::ledger::lock::ensure_entry_lockable;
use tally_core::ledger::reversal::{reversal_memo, reverse_lines};
use tally_core::ledger::{
    AuditAction, AuditRecord, CreateEntryInput, EntryLine, LedgerError, LedgerService,
    ReverseEntryInput, format_reference,
};
use tally_shared::types::{
    AccountId, EntryId, FiscalYearId, JournalId, OrganizationId, ProjectId, UserId,
};
use uuid::Uuid;

use super::audit::AuditRepository;
use super::error::RepositoryError;
use super::fiscal::FiscalYearRepository;
use super::sequence::SequenceRepository;
use crate::entities::{accounts, entries, entry_lines, journals, projects};

/// An entry with its lines in `line_no` order.
#[derive(Debug, Clone, Serialize)]
pub struct EntryWithLines {
    /// The entry header.
    #[serde(flatten)]
    pub entry: entries::Model,
    /// The lines.
    pub lines: Vec<entry_lines::Model>,
}

/// Converts a stored line back into a domain line.
#[must_use]
pub fn to_entry_line(line: &entry_lines::Model) -> EntryLine {
    EntryLine {
        account_id: AccountId::from_uuid(line.account_id),
        project_id: line.project_id.map(ProjectId::from_uuid),
        debit: line.debit,
        credit: line.credit,
        label: line.label.clone(),
    }
}

/// Entry repository.
pub struct EntryRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> EntryRepository<'a, C> {
    /// Creates a repository over `conn`.
    #[must_use]
    pub const fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Posts a new entry.
    ///
    /// Validation runs before a sequence number is allocated, so rejected
    /// entries never consume one.
    ///
    /// # Errors
    ///
    /// Returns the first ledger rule violated, or a database error.
    pub async fn create(
        &self,
        organization_id: OrganizationId,
        actor: UserId,
        input: CreateEntryInput,
    ) -> Result<EntryWithLines, RepositoryError> {
        self.insert_entry(organization_id, actor, input, None).await
    }

    /// Finds an entry and its lines.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` if it does not exist for the tenant.
    pub async fn find_with_lines(&self, id: EntryId) -> Result<EntryWithLines, RepositoryError> {
        let entry = entries::Entity::find_by_id(id.into_inner())
            .one(self.conn)
            .await?
            .ok_or(LedgerError::EntryNotFound(id.into_inner()))?;
        let lines = self.lines_of(id).await?;
        Ok(EntryWithLines { entry, lines })
    }

    /// Locks an entry. Locked entries can only be corrected by reversal.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` or `EntryAlreadyLocked`.
    pub async fn lock(
        &self,
        organization_id: OrganizationId,
        id: EntryId,
        actor: UserId,
    ) -> Result<entries::Model, RepositoryError> {
        // Conditional on the unlocked state so concurrent lockers see one winner.
        let now = Utc::now().fixed_offset();
        let result = entries::Entity::update_many()
            .col_expr(entries::Column::LockedAt, Expr::value(now))
            .col_expr(entries::Column::LockedBy, Expr::value(actor.into_inner()))
            .filter(entries::Column::Id.eq(id.into_inner()))
            .filter(entries::Column::LockedAt.is_null())
            .exec(self.conn)
            .await?;

        let entry = entries::Entity::find_by_id(id.into_inner())
            .one(self.conn)
            .await?
            .ok_or(LedgerError::EntryNotFound(id.into_inner()))?;

        if result.rows_affected == 0 {
            ensure_entry_lockable(id, entry.locked_at.map(|t| t.with_timezone(&Utc)))?;
            return Err(LedgerError::EntryAlreadyLocked(id.into_inner()).into());
        }

        AuditRepository::new(self.conn)
            .append(
                organization_id,
                AuditRecord::new(
                    actor,
                    AuditAction::EntryLock,
                    id,
                    json!({ "reference": entry.reference }),
                ),
            )
            .await?;

        tracing::info!(%organization_id, entry_id = %id, reference = %entry.reference, "Entry locked");
        Ok(entry)
    }

    /// Posts the reversal of an existing entry.
    ///
    /// The reversal mirrors the original's lines with debit and credit
    /// swapped. Fiscal year and journal default to the original's; the date
    /// defaults to `today`.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound`, or any error [`Self::create`] can return for
    /// the reversing entry.
    pub async fn reverse(
        &self,
        organization_id: OrganizationId,
        id: EntryId,
        actor: UserId,
        input: ReverseEntryInput,
        today: NaiveDate,
    ) -> Result<EntryWithLines, RepositoryError> {
        let original = self.find_with_lines(id).await?;
        let original_lines: Vec<EntryLine> = original.lines.iter().map(to_entry_line).collect();

        let reversal_input = CreateEntryInput {
            fiscal_year_id: input
                .fiscal_year_id
                .unwrap_or_else(|| FiscalYearId::from_uuid(original.entry.fiscal_year_id)),
            journal_id: input
                .journal_id
                .unwrap_or_else(|| JournalId::from_uuid(original.entry.journal_id)),
            date: input.date.unwrap_or(today),
            memo: Some(
                input
                    .memo
                    .unwrap_or_else(|| reversal_memo(&original.entry.reference)),
            ),
            lines: reverse_lines(&original_lines),
        };

        let reversal = self
            .insert_entry(organization_id, actor, reversal_input, Some(id))
            .await?;

        AuditRepository::new(self.conn)
            .append(
                organization_id,
                AuditRecord::new(
                    actor,
                    AuditAction::EntryReverse,
                    id,
                    json!({
                        "reference": original.entry.reference,
                        "reversal_id": reversal.entry.id,
                        "reversal_reference": reversal.entry.reference,
                    }),
                ),
            )
            .await?;

        tracing::info!(
            %organization_id,
            entry_id = %id,
            reversal_reference = %reversal.entry.reference,
            "Entry reversed"
        );
        Ok(reversal)
    }

    async fn insert_entry(
        &self,
        organization_id: OrganizationId,
        actor: UserId,
        input: CreateEntryInput,
        reversal_of: Option<EntryId>,
    ) -> Result<EntryWithLines, RepositoryError> {
        let fiscal_year = FiscalYearRepository::new(self.conn)
            .find_for_posting(input.fiscal_year_id)
            .await?;

        let journal = journals::Entity::find_by_id(input.journal_id.into_inner())
            .one(self.conn)
            .await?
            .ok_or(LedgerError::JournalNotFound(input.journal_id.into_inner()))?;

        let known_accounts = self.known_accounts(&input.lines).await?;
        let known_projects = self.known_projects(&input.lines).await?;

        let totals = LedgerService::validate_entry(
            &input,
            &fiscal_year,
            |account| known_accounts.contains(&account.into_inner()),
            |project| known_projects.contains(&project.into_inner()),
        )?;

        let sequence = SequenceRepository::new(self.conn)
            .next_value(organization_id, input.fiscal_year_id, input.journal_id)
            .await?;
        let reference = format_reference(fiscal_year.start_date, &journal.code, sequence);

        let entry_id = Uuid::now_v7();
        let entry = entries::ActiveModel {
            id: Set(entry_id),
            organization_id: Set(organization_id.into_inner()),
            fiscal_year_id: Set(input.fiscal_year_id.into_inner()),
            journal_id: Set(input.journal_id.into_inner()),
            sequence: Set(sequence),
            reference: Set(reference),
            date: Set(input.date),
            memo: Set(input.memo),
            locked_at: Set(None),
            locked_by: Set(None),
            reversal_of: Set(reversal_of.map(EntryId::into_inner)),
            bank_statement_id: Set(None),
            created_by: Set(actor.into_inner()),
            created_at: Set(Utc::now().fixed_offset()),
        }
        .insert(self.conn)
        .await?;

        let mut lines = Vec::with_capacity(input.lines.len());
        for (line_no, line) in (1..).zip(input.lines) {
            let model = entry_lines::ActiveModel {
                id: Set(Uuid::now_v7()),
                organization_id: Set(organization_id.into_inner()),
                entry_id: Set(entry_id),
                line_no: Set(line_no),
                account_id: Set(line.account_id.into_inner()),
                project_id: Set(line.project_id.map(ProjectId::into_inner)),
                debit: Set(line.debit),
                credit: Set(line.credit),
                label: Set(line.label),
            }
            .insert(self.conn)
            .await?;
            lines.push(model);
        }

        tracing::info!(
            %organization_id,
            entry_id = %entry_id,
            reference = %entry.reference,
            total = %totals.debit,
            "Entry posted"
        );

        Ok(EntryWithLines { entry, lines })
    }

    async fn lines_of(&self, id: EntryId) -> Result<Vec<entry_lines::Model>, RepositoryError> {
        Ok(entry_lines::Entity::find()
            .filter(entry_lines::Column::EntryId.eq(id.into_inner()))
            .order_by_asc(entry_lines::Column::LineNo)
            .all(self.conn)
            .await?)
    }

    async fn known_accounts(&self, lines: &[EntryLine]) -> Result<HashSet<Uuid>, RepositoryError> {
        let wanted: HashSet<Uuid> = lines.iter().map(|l| l.account_id.into_inner()).collect();
        if wanted.is_empty() {
            return Ok(HashSet::new());
        }

        let found: Vec<Uuid> = accounts::Entity::find()
            .select_only()
            .column(accounts::Column::Id)
            .filter(accounts::Column::Id.is_in(wanted))
            .into_tuple()
            .all(self.conn)
            .await?;
        Ok(found.into_iter().collect())
    }

    async fn known_projects(&self, lines: &[EntryLine]) -> Result<HashSet<Uuid>, RepositoryError> {
        let wanted: HashSet<Uuid> = lines
            .iter()
            .filter_map(|l| l.project_id.map(ProjectId::into_inner))
            .collect();
        if wanted.is_empty() {
            return Ok(HashSet::new());
        }

        let found: Vec<Uuid> = projects::Entity::find()
            .select_only()
            .column(projects::Column::Id)
            .filter(projects::Column::Id.is_in(wanted))
            .into_tuple()
            .all(self.conn)
            .await?;
        Ok(found.into_iter().collect())
    }
}
