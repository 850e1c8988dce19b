//! Ledger error types for validation and state errors.
//!
//! Every variant carries a stable machine-readable code and an HTTP-equivalent
//! status so the API boundary can serialize them uniformly.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Entry must have at least 2 lines.
    #[error("Entry must have at least 2 lines")]
    InsufficientLines,

    /// A line must carry exactly one positive side.
    #[error("Line {index} must have exactly one of debit or credit greater than zero")]
    InvalidLineSides {
        /// Zero-based position of the offending line.
        index: usize,
    },

    /// A line amount is negative.
    #[error("Line {index} has a negative amount")]
    NegativeAmount {
        /// Zero-based position of the offending line.
        index: usize,
    },

    /// An amount does not fit the ledger's fixed precision, or a sum overflowed.
    #[error("Amount out of range for {0}: at most 15 integer digits and 4 decimal places")]
    AmountOutOfRange(String),

    /// The same entry was supplied more than once to a statement.
    #[error("Entry {0} appears more than once in the statement")]
    DuplicateStatementEntry(Uuid),

    /// Statement period end is before its start.
    #[error("Statement period end {end} is before start {start}")]
    InvalidStatementPeriod {
        /// Period start.
        start: NaiveDate,
        /// Period end.
        end: NaiveDate,
    },

    // ========== Domain Rule Errors ==========
    /// Entry is not balanced (debits != credits).
    #[error("Entry is not balanced. Debit: {debit}, Credit: {credit}")]
    UnbalancedEntry {
        /// Total debit amount.
        debit: Decimal,
        /// Total credit amount.
        credit: Decimal,
    },

    /// Entry totals are zero.
    #[error("Entry total must be greater than zero")]
    ZeroTotal,

    /// Entry date falls outside the fiscal year.
    #[error("Date {date} is outside the fiscal year ({start} to {end})")]
    DateOutsideFiscalYear {
        /// The rejected entry date.
        date: NaiveDate,
        /// Fiscal year start.
        start: NaiveDate,
        /// Fiscal year end.
        end: NaiveDate,
    },

    /// The fiscal year is locked, no posting allowed.
    #[error("Fiscal year {0} is locked")]
    FiscalYearLocked(Uuid),

    /// Compliance exports require a locked fiscal year.
    #[error("Fiscal year {0} must be locked before it can be exported")]
    FiscalYearNotLockedForExport(Uuid),

    /// Declared closing balance does not match the computed one.
    #[error("Statement does not balance: expected closing {expected}, computed {computed}")]
    StatementBalanceMismatch {
        /// The closing balance declared on the statement.
        expected: Decimal,
        /// Opening balance plus the net effect of the supplied entries.
        computed: Decimal,
    },

    // ========== Not Found Errors ==========
    /// Fiscal year not found.
    #[error("Fiscal year not found: {0}")]
    FiscalYearNotFound(Uuid),

    /// Journal not found.
    #[error("Journal not found: {0}")]
    JournalNotFound(Uuid),

    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    /// Project not found.
    #[error("Project not found: {0}")]
    ProjectNotFound(Uuid),

    /// Entry not found.
    #[error("Entry not found: {0}")]
    EntryNotFound(Uuid),

    /// Bank account not found.
    #[error("Bank account not found: {0}")]
    BankAccountNotFound(Uuid),

    // ========== Conflict Errors ==========
    /// Entry has already been locked.
    #[error("Entry {0} is already locked")]
    EntryAlreadyLocked(Uuid),

    /// Fiscal year has already been locked.
    #[error("Fiscal year {0} is already locked")]
    FiscalYearAlreadyLocked(Uuid),

    /// Fiscal year is not locked, so it cannot be unlocked.
    #[error("Fiscal year {0} is not locked")]
    FiscalYearNotLocked(Uuid),

    /// Entry is already linked to a bank statement.
    #[error("Entry {0} is already linked to a bank statement")]
    EntryAlreadyReconciled(Uuid),

    // ========== Infrastructure Errors ==========
    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InsufficientLines => "INSUFFICIENT_LINES",
            Self::InvalidLineSides { .. } => "INVALID_LINE_SIDES",
            Self::NegativeAmount { .. } => "NEGATIVE_AMOUNT",
            Self::AmountOutOfRange(_) => "AMOUNT_OUT_OF_RANGE",
            Self::DuplicateStatementEntry(_) => "DUPLICATE_STATEMENT_ENTRY",
            Self::InvalidStatementPeriod { .. } => "INVALID_STATEMENT_PERIOD",
            Self::UnbalancedEntry { .. } => "UNBALANCED_ENTRY",
            Self::ZeroTotal => "ZERO_TOTAL",
            Self::DateOutsideFiscalYear { .. } => "DATE_OUTSIDE_FISCAL_YEAR",
            Self::FiscalYearLocked(_) => "FISCAL_YEAR_LOCKED",
            Self::FiscalYearNotLockedForExport(_) => "FISCAL_YEAR_NOT_LOCKED_FOR_EXPORT",
            Self::StatementBalanceMismatch { .. } => "STATEMENT_BALANCE_MISMATCH",
            Self::FiscalYearNotFound(_) => "FISCAL_YEAR_NOT_FOUND",
            Self::JournalNotFound(_) => "JOURNAL_NOT_FOUND",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::ProjectNotFound(_) => "PROJECT_NOT_FOUND",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Self::BankAccountNotFound(_) => "BANK_ACCOUNT_NOT_FOUND",
            Self::EntryAlreadyLocked(_) => "ENTRY_ALREADY_LOCKED",
            Self::FiscalYearAlreadyLocked(_) => "FISCAL_YEAR_ALREADY_LOCKED",
            Self::FiscalYearNotLocked(_) => "FISCAL_YEAR_NOT_LOCKED",
            Self::EntryAlreadyReconciled(_) => "ENTRY_ALREADY_RECONCILED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - malformed input
            Self::InsufficientLines
            | Self::InvalidLineSides { .. }
            | Self::NegativeAmount { .. }
            | Self::AmountOutOfRange(_)
            | Self::DuplicateStatementEntry(_)
            | Self::InvalidStatementPeriod { .. } => 400,

            // 404 Not Found
            Self::FiscalYearNotFound(_)
            | Self::JournalNotFound(_)
            | Self::AccountNotFound(_)
            | Self::ProjectNotFound(_)
            | Self::EntryNotFound(_)
            | Self::BankAccountNotFound(_) => 404,

            // 409 Conflict - state already transitioned
            Self::EntryAlreadyLocked(_)
            | Self::FiscalYearAlreadyLocked(_)
            | Self::FiscalYearNotLocked(_)
            | Self::EntryAlreadyReconciled(_) => 409,

            // 422 Unprocessable - double-entry and period rules
            Self::UnbalancedEntry { .. }
            | Self::ZeroTotal
            | Self::DateOutsideFiscalYear { .. }
            | Self::FiscalYearLocked(_)
            | Self::FiscalYearNotLockedForExport(_)
            | Self::StatementBalanceMismatch { .. } => 422,

            // 500 Internal Server Error
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns true for infrastructure faults.
    #[must_use]
    pub fn is_server_fault(&self) -> bool {
        self.http_status_code() >= 500
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_codes() {
        assert_eq!(LedgerError::InsufficientLines.error_code(), "INSUFFICIENT_LINES");
        assert_eq!(
            LedgerError::UnbalancedEntry {
                debit: dec!(1.00),
                credit: dec!(0.50),
            }
            .error_code(),
            "UNBALANCED_ENTRY"
        );
        assert_eq!(
            LedgerError::FiscalYearLocked(Uuid::nil()).error_code(),
            "FISCAL_YEAR_LOCKED"
        );
        assert_eq!(
            LedgerError::EntryAlreadyLocked(Uuid::nil()).error_code(),
            "ENTRY_ALREADY_LOCKED"
        );
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(LedgerError::InsufficientLines.http_status_code(), 400);
        assert_eq!(
            LedgerError::AmountOutOfRange("line 0".to_string()).http_status_code(),
            400
        );
        assert_eq!(LedgerError::EntryNotFound(Uuid::nil()).http_status_code(), 404);
        assert_eq!(
            LedgerError::EntryAlreadyLocked(Uuid::nil()).http_status_code(),
            409
        );
        assert_eq!(LedgerError::ZeroTotal.http_status_code(), 422);
        assert_eq!(
            LedgerError::StatementBalanceMismatch {
                expected: dec!(1200.00),
                computed: dec!(1130.00),
            }
            .http_status_code(),
            422
        );
        assert_eq!(
            LedgerError::Database("test".to_string()).http_status_code(),
            500
        );
    }

    #[test]
    fn test_server_faults() {
        assert!(LedgerError::Internal("x".to_string()).is_server_fault());
        assert!(!LedgerError::FiscalYearLocked(Uuid::nil()).is_server_fault());
    }

    #[test]
    fn test_error_display() {
        let err = LedgerError::UnbalancedEntry {
            debit: dec!(100.00),
            credit: dec!(50.00),
        };
        assert_eq!(
            err.to_string(),
            "Entry is not balanced. Debit: 100.00, Credit: 50.00"
        );

        let err = LedgerError::DateOutsideFiscalYear {
            date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "Date 2026-01-15 is outside the fiscal year (2025-01-01 to 2025-12-31)"
        );
    }
}
