//! Double-entry bookkeeping logic.
//!
//! This module implements the ledger consistency rules:
//! - Domain types for entry creation, reversal, and reconciliation
//! - Balanced-entry and fiscal year validation
//! - Entry reference formatting
//! - Lock/unlock state transitions
//! - Reversing entries
//! - Bank statement reconciliation
//! - Compliance exports
//! - Audit records
//! - Error types for ledger operations

pub mod audit;
pub mod error;
pub mod export;
pub mod lock;
pub mod reconciliation;
pub mod reference;
pub mod reversal;
pub mod service;
pub mod types;
pub mod validation;

#[cfg(test)]
mod validation_props;

pub use audit::{AuditAction, AuditRecord};
pub use error::LedgerError;
pub use export::{ComplianceDocument, ExportRow, build_export};
pub use reference::format_reference;
pub use service::LedgerService;
pub use types::{
    AMOUNT_LIMIT, AMOUNT_SCALE, CreateEntryInput, EntryLine, EntrySide, EntryTotals,
    FiscalYearInfo, RecordBankStatementInput, ReverseEntryInput, amount_fits_storage,
};
