//! Entry reference formatting.

use chrono::{Datelike, NaiveDate};

/// Width of the zero-padded sequence part of a reference.
pub const SEQUENCE_WIDTH: usize = 6;

/// Formats an entry reference as `{start_year}-{journal_code}-{sequence:06}`.
///
/// The year is the fiscal year's start year, so a year running from
/// 2025-07-01 to 2026-06-30 numbers its entries `2025-...`. Sequences wider
/// than six digits are printed in full.
#[must_use]
pub fn format_reference(fiscal_year_start: NaiveDate, journal_code: &str, sequence: i64) -> String {
    format!(
        "{}-{}-{:0width$}",
        fiscal_year_start.year(),
        journal_code,
        sequence,
        width = SEQUENCE_WIDTH
    )
}
