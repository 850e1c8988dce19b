//! Audit trail records for ledger state transitions.

use serde::Serialize;
use serde_json::Value;
use tally_shared::types::UserId;
use uuid::Uuid;

/// Audited actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditAction {
    /// An entry was locked.
    #[serde(rename = "entry.lock")]
    EntryLock,
    /// An entry was reversed.
    #[serde(rename = "entry.reverse")]
    EntryReverse,
    /// A fiscal year was locked.
    #[serde(rename = "fiscal_year.lock")]
    FiscalYearLock,
    /// A fiscal year was unlocked.
    #[serde(rename = "fiscal_year.unlock")]
    FiscalYearUnlock,
    /// A compliance export was generated.
    #[serde(rename = "fiscal_year.export")]
    FiscalYearExport,
    /// A bank statement was recorded and its entries linked.
    #[serde(rename = "bank_statement.record")]
    BankStatementRecord,
}

impl AuditAction {
    /// Returns the storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::EntryLock => "entry.lock",
            Self::EntryReverse => "entry.reverse",
            Self::FiscalYearLock => "fiscal_year.lock",
            Self::FiscalYearUnlock => "fiscal_year.unlock",
            Self::FiscalYearExport => "fiscal_year.export",
            Self::BankStatementRecord => "bank_statement.record",
        }
    }

    /// Returns the entity type the action applies to.
    #[must_use]
    pub const fn entity_type(&self) -> &'static str {
        match self {
            Self::EntryLock | Self::EntryReverse => "entry",
            Self::FiscalYearLock | Self::FiscalYearUnlock | Self::FiscalYearExport => {
                "fiscal_year"
            }
            Self::BankStatementRecord => "bank_statement",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An append-only audit record, written inside the tenant transaction.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    /// Who performed the action.
    pub actor_id: UserId,
    /// What was done.
    pub action: AuditAction,
    /// The entity acted upon.
    pub entity_id: Uuid,
    /// Action-specific details.
    pub payload: Value,
}

impl AuditRecord {
    /// Creates a record.
    #[must_use]
    pub fn new(actor_id: UserId, action: AuditAction, entity_id: impl Into<Uuid>, payload: Value) -> Self {
        Self {
            actor_id,
            action,
            entity_id: entity_id.into(),
            payload,
        }
    }

    /// Returns the entity type derived from the action.
    #[must_use]
    pub fn entity_type(&self) -> &'static str {
        self.action.entity_type()
    }
}
