//! Repository error type.

use sea_orm::DbErr;
use tally_core::ledger::LedgerError;

/// Errors returned by the ledger repositories.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// A ledger rule rejected the operation.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}
