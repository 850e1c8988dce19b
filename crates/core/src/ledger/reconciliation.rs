//! Bank statement reconciliation.
//!
//! A statement balances when its opening balance plus the net movement of the
//! supplied entries on the bank's ledger account equals the declared closing
//! balance, to the cent.

use std::collections::HashSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tally_shared::types::{AccountId, EntryId};

use super::error::LedgerError;
use super::types::{EntryLine, amount_fits_storage};

/// Checks the request shape: a sane period, storable balances and no entry
/// listed twice.
///
/// # Errors
///
/// Returns `InvalidStatementPeriod`, `AmountOutOfRange` or
/// `DuplicateStatementEntry`.
pub fn validate_statement_request(
    period_start: NaiveDate,
    period_end: NaiveDate,
    opening_balance: Decimal,
    closing_balance: Decimal,
    entry_ids: &[EntryId],
) -> Result<(), LedgerError> {
    if period_end < period_start {
        return Err(LedgerError::InvalidStatementPeriod {
            start: period_start,
            end: period_end,
        });
    }

    if !amount_fits_storage(opening_balance) {
        return Err(LedgerError::AmountOutOfRange("opening_balance".to_string()));
    }
    if !amount_fits_storage(closing_balance) {
        return Err(LedgerError::AmountOutOfRange("closing_balance".to_string()));
    }

    let mut seen = HashSet::with_capacity(entry_ids.len());
    for id in entry_ids {
        if !seen.insert(*id) {
            return Err(LedgerError::DuplicateStatementEntry(id.into_inner()));
        }
    }

    Ok(())
}

/// Computes the closing balance implied by `opening` and the lines that hit
/// `ledger_account`. Lines on other accounts are ignored.
///
/// # Errors
///
/// Returns `AmountOutOfRange` if the running balance overflows.
pub fn computed_closing<'a, I>(
    opening: Decimal,
    ledger_account: AccountId,
    lines: I,
) -> Result<Decimal, LedgerError>
where
    I: IntoIterator<Item = &'a EntryLine>,
{
    lines
        .into_iter()
        .filter(|line| line.account_id == ledger_account)
        .try_fold(opening, |balance, line| {
            line.checked_net().and_then(|net| balance.checked_add(net))
        })
        .ok_or_else(|| LedgerError::AmountOutOfRange("computed closing balance".to_string()))
}

/// Checks that the declared closing balance matches the computed one.
///
/// Returns the computed closing balance on success.
///
/// # Errors
///
/// Returns `StatementBalanceMismatch` carrying both figures, or
/// `AmountOutOfRange` if the computed balance overflows.
pub fn reconcile<'a, I>(
    opening: Decimal,
    declared_closing: Decimal,
    ledger_account: AccountId,
    lines: I,
) -> Result<Decimal, LedgerError>
where
    I: IntoIterator<Item = &'a EntryLine>,
{
    let computed = computed_closing(opening, ledger_account, lines)?;
    if computed == declared_closing {
        Ok(computed)
    } else {
        Err(LedgerError::StatementBalanceMismatch {
            expected: declared_closing,
            computed,
        })
    }
}
