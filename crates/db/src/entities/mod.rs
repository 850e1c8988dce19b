//! `SeaORM` entity definitions.
//!
//! Every table except `organizations` carries `organization_id` and is
//! guarded by the `tenant_isolation` row-level security policy.

pub mod accounts;
pub mod audit_log;
pub mod bank_accounts;
pub mod bank_statements;
pub mod compliance_exports;
pub mod entries;
pub mod entry_lines;
pub mod fiscal_years;
pub mod journals;
pub mod organizations;
pub mod projects;
pub mod sequence_counters;

pub mod prelude {
    //! Convenient re-exports of all entities.
    pub use super::accounts::Entity as Accounts;
    pub use super::audit_log::Entity as AuditLog;
    pub use super::bank_accounts::Entity as BankAccounts;
    pub use super::bank_statements::Entity as BankStatements;
    pub use super::compliance_exports::Entity as ComplianceExports;
    pub use super::entries::Entity as Entries;
    pub use super::entry_lines::Entity as EntryLines;
    pub use super::fiscal_years::Entity as FiscalYears;
    pub use super::journals::Entity as Journals;
    pub use super::organizations::Entity as Organizations;
    pub use super::projects::Entity as Projects;
    pub use super::sequence_counters::Entity as SequenceCounters;
}
