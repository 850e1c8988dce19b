//! Lock state transitions for entries and fiscal years.
//!
//! Entries go from unlocked to locked exactly once and never back. Fiscal
//! years may be locked and unlocked by a managing role. The repository layer
//! performs the transition with a conditional UPDATE; these functions decide
//! which error a failed transition maps to.

use chrono::{DateTime, Utc};
use tally_shared::types::{EntryId, FiscalYearId};

use super::error::LedgerError;

/// Checks that an entry may be locked.
///
/// # Errors
///
/// Returns `EntryAlreadyLocked` when `locked_at` is already set.
pub fn ensure_entry_lockable(
    entry_id: EntryId,
    locked_at: Option<DateTime<Utc>>,
) -> Result<(), LedgerError> {
    match locked_at {
        Some(_) => Err(LedgerError::EntryAlreadyLocked(entry_id.into_inner())),
        None => Ok(()),
    }
}

/// Checks that a fiscal year may be locked.
///
/// # Errors
///
/// Returns `FiscalYearAlreadyLocked` when `locked_at` is already set.
pub fn ensure_fiscal_year_lockable(
    fiscal_year_id: FiscalYearId,
    locked_at: Option<DateTime<Utc>>,
) -> Result<(), LedgerError> {
    match locked_at {
        Some(_) => Err(LedgerError::FiscalYearAlreadyLocked(
            fiscal_year_id.into_inner(),
        )),
        None => Ok(()),
    }
}

/// Checks that a fiscal year may be unlocked.
///
/// # Errors
///
/// Returns `FiscalYearNotLocked` when `locked_at` is not set.
pub fn ensure_fiscal_year_unlockable(
    fiscal_year_id: FiscalYearId,
    locked_at: Option<DateTime<Utc>>,
) -> Result<(), LedgerError> {
    match locked_at {
        Some(_) => Ok(()),
        None => Err(LedgerError::FiscalYearNotLocked(fiscal_year_id.into_inner())),
    }
}

/// Checks that a fiscal year is locked before a compliance export.
///
/// # Errors
///
/// Returns `FiscalYearNotLockedForExport` when `locked_at` is not set.
pub fn ensure_fiscal_year_exportable(
    fiscal_year_id: FiscalYearId,
    locked_at: Option<DateTime<Utc>>,
) -> Result<(), LedgerError> {
    match locked_at {
        Some(_) => Ok(()),
        None => Err(LedgerError::FiscalYearNotLockedForExport(
            fiscal_year_id.into_inner(),
        )),
    }
}
