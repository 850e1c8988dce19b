//! Ledger domain types for entry creation, reversal, and reconciliation.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{
    AccountId, BankAccountId, EntryId, FiscalYearId, JournalId, ProjectId,
};

/// Side of an entry line.
///
/// In double-entry bookkeeping every line moves money on exactly one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntrySide {
    /// Debit line.
    Debit,
    /// Credit line.
    Credit,
}

/// Decimal places an amount may carry. Amounts are stored as `NUMERIC(19, 4)`.
pub const AMOUNT_SCALE: u32 = 4;

/// Exclusive bound on an amount's magnitude: 10^15, i.e. 15 integer digits.
pub const AMOUNT_LIMIT: Decimal = Decimal::from_parts(0xA4C6_8000, 0x0003_8D7E, 0, false, 0);

/// Returns true if `amount` can be stored without rounding or overflow.
///
/// Trailing zeros do not count against the scale, so `1.50000` fits.
#[must_use]
pub fn amount_fits_storage(amount: Decimal) -> bool {
    amount.normalize().scale() <= AMOUNT_SCALE && amount.abs() < AMOUNT_LIMIT
}

/// A single line of an entry: one account, one side, one amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryLine {
    /// The account to post to.
    pub account_id: AccountId,
    /// Optional analytic project.
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    /// Debit amount, zero on credit lines.
    #[serde(default)]
    pub debit: Decimal,
    /// Credit amount, zero on debit lines.
    #[serde(default)]
    pub credit: Decimal,
    /// Optional line label.
    #[serde(default)]
    pub label: Option<String>,
}

impl EntryLine {
    /// Creates a debit line.
    #[must_use]
    pub fn debit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            project_id: None,
            debit: amount,
            credit: Decimal::ZERO,
            label: None,
        }
    }

    /// Creates a credit line.
    #[must_use]
    pub fn credit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            project_id: None,
            debit: Decimal::ZERO,
            credit: amount,
            label: None,
        }
    }

    /// Returns the side this line moves, or `None` if it is not exactly one-sided.
    #[must_use]
    pub fn side(&self) -> Option<EntrySide> {
        match (self.debit > Decimal::ZERO, self.credit > Decimal::ZERO) {
            (true, false) if self.credit.is_zero() => Some(EntrySide::Debit),
            (false, true) if self.debit.is_zero() => Some(EntrySide::Credit),
            _ => None,
        }
    }

    /// Returns debit minus credit, or `None` on overflow.
    #[must_use]
    pub fn checked_net(&self) -> Option<Decimal> {
        self.debit.checked_sub(self.credit)
    }
}

/// Input for creating a new entry.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEntryInput {
    /// Fiscal year the entry is posted in.
    pub fiscal_year_id: FiscalYearId,
    /// Journal the entry is numbered in.
    pub journal_id: JournalId,
    /// Accounting date.
    pub date: NaiveDate,
    /// Optional memo.
    #[serde(default)]
    pub memo: Option<String>,
    /// The lines (must have at least 2).
    pub lines: Vec<EntryLine>,
}

/// Input for reversing an existing entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReverseEntryInput {
    /// Fiscal year for the reversal; defaults to the original's.
    #[serde(default)]
    pub fiscal_year_id: Option<FiscalYearId>,
    /// Journal for the reversal; defaults to the original's.
    #[serde(default)]
    pub journal_id: Option<JournalId>,
    /// Date of the reversal; defaults to today.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Memo for the reversal; defaults to a reference to the original.
    #[serde(default)]
    pub memo: Option<String>,
}

/// Input for recording a bank statement.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordBankStatementInput {
    /// The bank account the statement belongs to.
    pub bank_account_id: BankAccountId,
    /// First day covered by the statement.
    pub period_start: NaiveDate,
    /// Last day covered by the statement.
    pub period_end: NaiveDate,
    /// Balance at period start.
    pub opening_balance: Decimal,
    /// Balance declared at period end.
    pub closing_balance: Decimal,
    /// Entries to link to the statement.
    pub entry_ids: Vec<EntryId>,
}

/// Fiscal year facts the engine needs to accept or reject a posting.
#[derive(Debug, Clone)]
pub struct FiscalYearInfo {
    /// Fiscal year ID.
    pub id: FiscalYearId,
    /// First day of the year.
    pub start_date: NaiveDate,
    /// Last day of the year.
    pub end_date: NaiveDate,
    /// Set once the year is locked.
    pub locked_at: Option<DateTime<Utc>>,
}

impl FiscalYearInfo {
    /// Returns true if the year is locked.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }

    /// Returns true if `date` falls within the year, bounds inclusive.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// Entry totals after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryTotals {
    /// Sum of debits.
    pub debit: Decimal,
    /// Sum of credits.
    pub credit: Decimal,
}

impl EntryTotals {
    /// Sums the lines, or returns `None` if either total overflows.
    #[must_use]
    pub fn checked_from_lines(lines: &[EntryLine]) -> Option<Self> {
        lines.iter().try_fold(
            Self {
                debit: Decimal::ZERO,
                credit: Decimal::ZERO,
            },
            |totals, line| {
                Some(Self {
                    debit: totals.debit.checked_add(line.debit)?,
                    credit: totals.credit.checked_add(line.credit)?,
                })
            },
        )
    }

    /// Returns true when debits equal credits.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.debit == self.credit
    }
}
