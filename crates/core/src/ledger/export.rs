//! Compliance export of a locked fiscal year.
//!
//! The export is a tab-separated listing of every entry line, one line per
//! row, ordered by date, then reference, then line position. The same ledger
//! always produces the same bytes and therefore the same checksum.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

/// Header row of the export.
pub const EXPORT_HEADER: &str =
    "date\treference\tjournal\taccount\tproject\tdebit\tcredit\tlabel\tmemo";

/// One entry line as it appears in the export.
#[derive(Debug, Clone)]
pub struct ExportRow {
    /// Entry date.
    pub date: NaiveDate,
    /// Entry reference.
    pub reference: String,
    /// Position of the line inside its entry.
    pub line_no: i32,
    /// Journal code.
    pub journal_code: String,
    /// Account code.
    pub account_code: String,
    /// Project code, if any.
    pub project_code: Option<String>,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
    /// Line label.
    pub label: Option<String>,
    /// Entry memo.
    pub memo: Option<String>,
}

/// Rendered export content with its checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplianceDocument {
    /// The TSV content.
    pub content: String,
    /// Lowercase hex SHA-256 of `content`.
    pub checksum: String,
    /// Number of data rows.
    pub row_count: usize,
}

/// Renders `rows` in canonical order and checksums the result.
#[must_use]
pub fn build_export(mut rows: Vec<ExportRow>) -> ComplianceDocument {
    rows.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.reference.cmp(&b.reference))
            .then_with(|| a.line_no.cmp(&b.line_no))
    });

    let mut content = String::with_capacity(EXPORT_HEADER.len() + rows.len() * 96);
    content.push_str(EXPORT_HEADER);
    content.push('\n');

    for row in &rows {
        let fields = [
            row.date.to_string(),
            sanitize(&row.reference),
            sanitize(&row.journal_code),
            sanitize(&row.account_code),
            row.project_code.as_deref().map(sanitize).unwrap_or_default(),
            row.debit.normalize().to_string(),
            row.credit.normalize().to_string(),
            row.label.as_deref().map(sanitize).unwrap_or_default(),
            row.memo.as_deref().map(sanitize).unwrap_or_default(),
        ];
        content.push_str(&fields.join("\t"));
        content.push('\n');
    }

    let checksum = checksum(content.as_bytes());

    ComplianceDocument {
        content,
        checksum,
        row_count: rows.len(),
    }
}

/// Lowercase hex SHA-256 digest.
#[must_use]
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

// Tabs and line breaks would shift columns.
fn sanitize(value: &str) -> String {
    value.replace(['\t', '\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(day: u32, reference: &str, line_no: i32, debit: Decimal, credit: Decimal) -> ExportRow {
        ExportRow {
            date: NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
            reference: reference.to_string(),
            line_no,
            journal_code: "BAN".to_string(),
            account_code: "512000".to_string(),
            project_code: None,
            debit,
            credit,
            label: None,
            memo: Some("Rent\tMarch".to_string()),
        }
    }

    #[test]
    fn test_rows_are_ordered_and_sanitized() {
        let doc = build_export(vec![
            row(2, "2025-BAN-000002", 1, dec!(0), dec!(10.00)),
            row(1, "2025-BAN-000001", 2, dec!(0), dec!(5.50)),
            row(1, "2025-BAN-000001", 1, dec!(5.50), dec!(0)),
        ]);

        let lines: Vec<&str> = doc.content.lines().collect();
        assert_eq!(lines[0], EXPORT_HEADER);
        assert!(lines[1].starts_with("2025-03-01\t2025-BAN-000001\tBAN\t512000\t\t5.5\t0\t"));
        assert!(lines[2].starts_with("2025-03-01\t2025-BAN-000001"));
        assert!(lines[3].starts_with("2025-03-02\t2025-BAN-000002"));
        assert!(lines[1].ends_with("\tRent March"));
        assert_eq!(doc.row_count, 3);
        assert!(lines.iter().all(|l| l.split('\t').count() == 9));
    }

    #[test]
    fn test_export_is_deterministic() {
        let a = build_export(vec![
            row(1, "2025-BAN-000001", 1, dec!(5.50), dec!(0)),
            row(1, "2025-BAN-000001", 2, dec!(0), dec!(5.50)),
        ]);
        let b = build_export(vec![
            row(1, "2025-BAN-000001", 2, dec!(0), dec!(5.50)),
            row(1, "2025-BAN-000001", 1, dec!(5.50), dec!(0)),
        ]);
        assert_eq!(a, b);
        assert_eq!(a.checksum.len(), 64);
        assert_eq!(a.checksum, checksum(a.content.as_bytes()));
    }

    #[test]
    fn test_checksum_known_value() {
        assert_eq!(
            checksum(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
