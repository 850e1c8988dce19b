//! Per-journal sequence allocation.
//!
//! One upsert both creates the counter on first use and increments it.
//! Concurrent callers serialize on the counter row lock, so values are
//! strictly increasing and never handed out twice. A transaction that rolls
//! back after allocating leaves a gap.

use sea_orm::{ConnectionTrait, DbBackend, DbErr, Statement};
use tally_shared::types::{FiscalYearId, JournalId, OrganizationId};

const NEXT_VALUE_SQL: &str = r"
INSERT INTO sequence_counters (organization_id, fiscal_year_id, journal_id, next_value)
VALUES ($1, $2, $3, 2)
ON CONFLICT (organization_id, fiscal_year_id, journal_id)
DO UPDATE SET next_value = sequence_counters.next_value + 1
RETURNING next_value - 1 AS value
";

/// Sequence counter repository.
pub struct SequenceRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> SequenceRepository<'a, C> {
    /// Creates a repository over `conn`.
    #[must_use]
    pub const fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Allocates the next sequence number for (tenant, fiscal year, journal).
    ///
    /// The first call for a key returns 1.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub async fn next_value(
        &self,
        organization_id: OrganizationId,
        fiscal_year_id: FiscalYearId,
        journal_id: JournalId,
    ) -> Result<i64, DbErr> {
        let row = self
            .conn
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                NEXT_VALUE_SQL,
                [
                    organization_id.into_inner().into(),
                    fiscal_year_id.into_inner().into(),
                    journal_id.into_inner().into(),
                ],
            ))
            .await?
            .ok_or_else(|| DbErr::RecordNotFound("sequence counter".to_string()))?;

        let value: i64 = row.try_get("", "value")?;
        tracing::debug!(%organization_id, %fiscal_year_id, %journal_id, value, "Allocated sequence");
        Ok(value)
    }
}
