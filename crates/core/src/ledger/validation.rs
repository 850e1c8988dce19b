//! Business rule validation for entries.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::error::LedgerError;
use super::types::{EntryLine, EntryTotals, FiscalYearInfo, amount_fits_storage};

/// Validates the lines of an entry and returns their totals.
///
/// Rules, in order:
/// 1. At least two lines
/// 2. No negative amount on either side
/// 3. Each line has exactly one positive side
/// 4. Every amount, and both totals, fit the stored precision
/// 5. Total debit equals total credit
/// 6. That total is strictly positive
pub fn validate_lines(lines: &[EntryLine]) -> Result<EntryTotals, LedgerError> {
    if lines.len() < 2 {
        return Err(LedgerError::InsufficientLines);
    }

    for (index, line) in lines.iter().enumerate() {
        if line.debit < Decimal::ZERO || line.credit < Decimal::ZERO {
            return Err(LedgerError::NegativeAmount { index });
        }
        if line.side().is_none() {
            return Err(LedgerError::InvalidLineSides { index });
        }
        if !amount_fits_storage(line.debit) || !amount_fits_storage(line.credit) {
            return Err(LedgerError::AmountOutOfRange(format!("line {index}")));
        }
    }

    // The balance trigger sums into the same precision, so totals must fit too.
    let totals = EntryTotals::checked_from_lines(lines)
        .filter(|t| amount_fits_storage(t.debit) && amount_fits_storage(t.credit))
        .ok_or_else(|| LedgerError::AmountOutOfRange("entry total".to_string()))?;

    if !totals.is_balanced() {
        return Err(LedgerError::UnbalancedEntry {
            debit: totals.debit,
            credit: totals.credit,
        });
    }

    // Unreachable with one-sided positive lines, kept as the invariant's last word.
    if totals.debit <= Decimal::ZERO {
        return Err(LedgerError::ZeroTotal);
    }

    Ok(totals)
}

/// Validates that an entry dated `date` may be posted into `fiscal_year`.
pub fn validate_posting_date(
    fiscal_year: &FiscalYearInfo,
    date: NaiveDate,
) -> Result<(), LedgerError> {
    if fiscal_year.is_locked() {
        return Err(LedgerError::FiscalYearLocked(fiscal_year.id.into_inner()));
    }

    if !fiscal_year.contains(date) {
        return Err(LedgerError::DateOutsideFiscalYear {
            date,
            start: fiscal_year.start_date,
            end: fiscal_year.end_date,
        });
    }

    Ok(())
}
