//! Repository abstractions for data access.
//!
//! Repositories are generic over `ConnectionTrait` and are normally handed
//! the request's tenant transaction, so everything one request writes
//! commits or rolls back together.

pub mod audit;
pub mod bank_statement;
pub mod entry;
pub mod error;
pub mod fiscal;
pub mod organization;
pub mod sequence;

pub use audit::AuditRepository;
pub use bank_statement::{BankStatementRepository, RecordedStatement};
pub use entry::{EntryRepository, EntryWithLines};
pub use error::RepositoryError;
pub use fiscal::FiscalYearRepository;
pub use organization::{OrganizationAccess, OrganizationRepository};
pub use sequence::SequenceRepository;
