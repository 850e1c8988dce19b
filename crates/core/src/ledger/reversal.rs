//! Reversing entries.
//!
//! A reversal is a new entry whose lines mirror the original with debit and
//! credit swapped. Accounts, projects and labels are preserved.

use super::types::EntryLine;

/// Builds the reversing lines for `original`.
///
/// The result is balanced whenever the original is.
#[must_use]
pub fn reverse_lines(original: &[EntryLine]) -> Vec<EntryLine> {
    original
        .iter()
        .map(|line| EntryLine {
            account_id: line.account_id,
            project_id: line.project_id,
            debit: line.credit,
            credit: line.debit,
            label: line.label.clone(),
        })
        .collect()
}

/// Default memo for a reversal of the entry with the given reference.
#[must_use]
pub fn reversal_memo(original_reference: &str) -> String {
    format!("Reversal of {original_reference}")
}
