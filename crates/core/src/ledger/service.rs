//! Ledger service for entry validation.
//!
//! Pure business logic: the repository layer loads the facts (fiscal year,
//! which accounts and projects belong to the tenant) and this service decides
//! whether the entry may be written.

use tally_shared::types::{AccountId, ProjectId};

use super::error::LedgerError;
use super::types::{CreateEntryInput, EntryTotals, FiscalYearInfo};
use super::validation::{validate_lines, validate_posting_date};

/// Ledger service for entry validation.
pub struct LedgerService;

impl LedgerService {
    /// Validate an entry before a sequence number is allocated for it.
    ///
    /// Checks run in this order:
    /// 1. Fiscal year is unlocked and contains the entry date
    /// 2. Every referenced account belongs to the tenant
    /// 3. Every referenced project belongs to the tenant
    /// 4. Line shape and balance (see [`validate_lines`])
    ///
    /// # Errors
    ///
    /// Returns the first `LedgerError` encountered.
    pub fn validate_entry<A, P>(
        input: &CreateEntryInput,
        fiscal_year: &FiscalYearInfo,
        account_exists: A,
        project_exists: P,
    ) -> Result<EntryTotals, LedgerError>
    where
        A: Fn(AccountId) -> bool,
        P: Fn(ProjectId) -> bool,
    {
        validate_posting_date(fiscal_year, input.date)?;

        for line in &input.lines {
            if !account_exists(line.account_id) {
                return Err(LedgerError::AccountNotFound(line.account_id.into_inner()));
            }
            if let Some(project_id) = line.project_id
                && !project_exists(project_id)
            {
                return Err(LedgerError::ProjectNotFound(project_id.into_inner()));
            }
        }

        validate_lines(&input.lines)
    }
}
