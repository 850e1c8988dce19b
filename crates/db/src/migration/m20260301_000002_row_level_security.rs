//! Row-level security for every tenant table.
//!
//! Policies compare `organization_id` with the transaction-local setting
//! `app.current_organization_id`. `FORCE` makes them apply to the table owner
//! too. An unset setting reads as NULL, or as an empty string on a pooled
//! connection that was scoped before; `NULLIF` folds both to NULL so no
//! rows match.
//!
//! `organizations` is the tenant registry and is read before any tenant
//! transaction exists, so it stays outside RLS.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(RLS_SQL).await?;
        db.execute_unprepared(APP_ROLE_GRANTS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DISABLE_RLS_SQL).await?;
        Ok(())
    }
}

/// Tables isolated per tenant.
pub const TENANT_TABLES: &[&str] = &[
    "fiscal_years",
    "journals",
    "accounts",
    "projects",
    "bank_accounts",
    "bank_statements",
    "entries",
    "entry_lines",
    "sequence_counters",
    "audit_log",
    "compliance_exports",
];

const RLS_SQL: &str = r"
DO $$
DECLARE
    t TEXT;
BEGIN
    FOREACH t IN ARRAY ARRAY[
        'fiscal_years', 'journals', 'accounts', 'projects', 'bank_accounts',
        'bank_statements', 'entries', 'entry_lines', 'sequence_counters',
        'audit_log', 'compliance_exports'
    ]
    LOOP
        EXECUTE format('ALTER TABLE %I ENABLE ROW LEVEL SECURITY', t);
        EXECUTE format('ALTER TABLE %I FORCE ROW LEVEL SECURITY', t);
        EXECUTE format(
            'CREATE POLICY tenant_isolation ON %I '
            'USING (organization_id = NULLIF(current_setting(''app.current_organization_id'', true), '''')::UUID)',
            t
        );
    END LOOP;
END
$$;
";

// The application connects as `tally_app` in production, a role without
// BYPASSRLS. Skipped when the role does not exist.
const APP_ROLE_GRANTS_SQL: &str = r"
DO $$
BEGIN
    IF EXISTS (SELECT 1 FROM pg_roles WHERE rolname = 'tally_app') THEN
        GRANT SELECT ON organizations TO tally_app;
        GRANT SELECT, INSERT, UPDATE ON
            fiscal_years, journals, accounts, projects, bank_accounts,
            bank_statements, entries, entry_lines, sequence_counters,
            compliance_exports
        TO tally_app;
        GRANT SELECT, INSERT ON audit_log TO tally_app;
    END IF;
END
$$;
";

const DISABLE_RLS_SQL: &str = r"
DO $$
DECLARE
    t TEXT;
BEGIN
    FOREACH t IN ARRAY ARRAY[
        'fiscal_years', 'journals', 'accounts', 'projects', 'bank_accounts',
        'bank_statements', 'entries', 'entry_lines', 'sequence_counters',
        'audit_log', 'compliance_exports'
    ]
    LOOP
        EXECUTE format('DROP POLICY IF EXISTS tenant_isolation ON %I', t);
        EXECUTE format('ALTER TABLE %I NO FORCE ROW LEVEL SECURITY', t);
        EXECUTE format('ALTER TABLE %I DISABLE ROW LEVEL SECURITY', t);
    END LOOP;
END
$$;
";
