//! Initial database migration.
//!
//! Creates the ledger tables, the sequence counter table, and the triggers
//! that keep posted data immutable.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: TENANTS & PERIODS
        // ============================================================
        db.execute_unprepared(ORGANIZATIONS_SQL).await?;
        db.execute_unprepared(FISCAL_YEARS_SQL).await?;

        // ============================================================
        // PART 2: REFERENCE DATA
        // ============================================================
        db.execute_unprepared(JOURNALS_SQL).await?;
        db.execute_unprepared(ACCOUNTS_SQL).await?;
        db.execute_unprepared(PROJECTS_SQL).await?;
        db.execute_unprepared(BANK_ACCOUNTS_SQL).await?;

        // ============================================================
        // PART 3: LEDGER
        // ============================================================
        db.execute_unprepared(BANK_STATEMENTS_SQL).await?;
        db.execute_unprepared(ENTRIES_SQL).await?;
        db.execute_unprepared(ENTRY_LINES_SQL).await?;
        db.execute_unprepared(SEQUENCE_COUNTERS_SQL).await?;

        // ============================================================
        // PART 4: AUDIT & COMPLIANCE
        // ============================================================
        db.execute_unprepared(AUDIT_LOG_SQL).await?;
        db.execute_unprepared(COMPLIANCE_EXPORTS_SQL).await?;

        // ============================================================
        // PART 5: TRIGGERS & FUNCTIONS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const ORGANIZATIONS_SQL: &str = r"
CREATE TABLE organizations (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    access_locked_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
";

const FISCAL_YEARS_SQL: &str = r"
CREATE TABLE fiscal_years (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    organization_id UUID NOT NULL REFERENCES organizations(id),
    label VARCHAR(50) NOT NULL,
    start_date DATE NOT NULL,
    end_date DATE NOT NULL,
    locked_at TIMESTAMPTZ,
    locked_by UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT fiscal_years_dates CHECK (end_date >= start_date),
    CONSTRAINT fiscal_years_label_unique UNIQUE (organization_id, label)
);

CREATE INDEX idx_fiscal_years_org ON fiscal_years(organization_id);
";

const JOURNALS_SQL: &str = r"
CREATE TABLE journals (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    organization_id UUID NOT NULL REFERENCES organizations(id),
    code VARCHAR(16) NOT NULL,
    name VARCHAR(255) NOT NULL,
    journal_type VARCHAR(20) NOT NULL
        CHECK (journal_type IN ('bank', 'sales', 'purchases', 'general')),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT journals_code_unique UNIQUE (organization_id, code)
);
";

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    organization_id UUID NOT NULL REFERENCES organizations(id),
    code VARCHAR(32) NOT NULL,
    name VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT accounts_code_unique UNIQUE (organization_id, code)
);
";

const PROJECTS_SQL: &str = r"
CREATE TABLE projects (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    organization_id UUID NOT NULL REFERENCES organizations(id),
    code VARCHAR(32) NOT NULL,
    name VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT projects_code_unique UNIQUE (organization_id, code)
);
";

const BANK_ACCOUNTS_SQL: &str = r"
CREATE TABLE bank_accounts (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    organization_id UUID NOT NULL REFERENCES organizations(id),
    account_id UUID NOT NULL REFERENCES accounts(id),
    name VARCHAR(255) NOT NULL,
    iban VARCHAR(34),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT bank_accounts_account_unique UNIQUE (account_id)
);
";

const BANK_STATEMENTS_SQL: &str = r"
CREATE TABLE bank_statements (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    organization_id UUID NOT NULL REFERENCES organizations(id),
    bank_account_id UUID NOT NULL REFERENCES bank_accounts(id),
    period_start DATE NOT NULL,
    period_end DATE NOT NULL,
    opening_balance NUMERIC(19, 4) NOT NULL,
    closing_balance NUMERIC(19, 4) NOT NULL,
    created_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT bank_statements_period CHECK (period_end >= period_start)
);
";

const ENTRIES_SQL: &str = r"
CREATE TABLE entries (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    organization_id UUID NOT NULL REFERENCES organizations(id),
    fiscal_year_id UUID NOT NULL REFERENCES fiscal_years(id),
    journal_id UUID NOT NULL REFERENCES journals(id),
    sequence BIGINT NOT NULL,
    reference VARCHAR(64) NOT NULL,
    date DATE NOT NULL,
    memo TEXT,
    locked_at TIMESTAMPTZ,
    locked_by UUID,
    reversal_of UUID REFERENCES entries(id),
    bank_statement_id UUID REFERENCES bank_statements(id),
    created_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT entries_sequence_unique UNIQUE (organization_id, fiscal_year_id, journal_id, sequence)
);

CREATE INDEX idx_entries_org_fiscal_year ON entries(organization_id, fiscal_year_id);
CREATE INDEX idx_entries_statement ON entries(bank_statement_id) WHERE bank_statement_id IS NOT NULL;
";

const ENTRY_LINES_SQL: &str = r"
CREATE TABLE entry_lines (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    organization_id UUID NOT NULL REFERENCES organizations(id),
    entry_id UUID NOT NULL REFERENCES entries(id),
    line_no INTEGER NOT NULL,
    account_id UUID NOT NULL REFERENCES accounts(id),
    project_id UUID REFERENCES projects(id),
    debit NUMERIC(19, 4) NOT NULL DEFAULT 0,
    credit NUMERIC(19, 4) NOT NULL DEFAULT 0,
    label TEXT,

    CONSTRAINT entry_lines_one_side CHECK (
        (debit > 0 AND credit = 0) OR (credit > 0 AND debit = 0)
    ),
    CONSTRAINT entry_lines_position_unique UNIQUE (entry_id, line_no)
);

CREATE INDEX idx_entry_lines_entry ON entry_lines(entry_id);
CREATE INDEX idx_entry_lines_account ON entry_lines(account_id);
";

const SEQUENCE_COUNTERS_SQL: &str = r"
CREATE TABLE sequence_counters (
    organization_id UUID NOT NULL REFERENCES organizations(id),
    fiscal_year_id UUID NOT NULL REFERENCES fiscal_years(id),
    journal_id UUID NOT NULL REFERENCES journals(id),
    next_value BIGINT NOT NULL DEFAULT 1,

    PRIMARY KEY (organization_id, fiscal_year_id, journal_id)
);
";

const AUDIT_LOG_SQL: &str = r"
CREATE TABLE audit_log (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    organization_id UUID NOT NULL REFERENCES organizations(id),
    actor_id UUID NOT NULL,
    action VARCHAR(64) NOT NULL,
    entity_type VARCHAR(32) NOT NULL,
    entity_id UUID NOT NULL,
    payload JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX idx_audit_log_entity ON audit_log(organization_id, entity_type, entity_id);
";

const COMPLIANCE_EXPORTS_SQL: &str = r"
CREATE TABLE compliance_exports (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    organization_id UUID NOT NULL REFERENCES organizations(id),
    fiscal_year_id UUID NOT NULL REFERENCES fiscal_years(id),
    content TEXT NOT NULL,
    checksum CHAR(64) NOT NULL,
    row_count INTEGER NOT NULL,
    generated_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: check_entry_balance
-- Backstop for double-entry balance, checked at commit
-- ============================================================
CREATE OR REPLACE FUNCTION check_entry_balance()
RETURNS TRIGGER AS $$
DECLARE
    total_debit NUMERIC(19, 4);
    total_credit NUMERIC(19, 4);
BEGIN
    SELECT
        COALESCE(SUM(debit), 0),
        COALESCE(SUM(credit), 0)
    INTO total_debit, total_credit
    FROM entry_lines
    WHERE entry_id = NEW.entry_id;

    IF total_debit <> total_credit OR total_debit <= 0 THEN
        RAISE EXCEPTION 'Entry % is not balanced. Debit: %, Credit: %',
            NEW.entry_id, total_debit, total_credit;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE CONSTRAINT TRIGGER trg_check_entry_balance
AFTER INSERT ON entry_lines
DEFERRABLE INITIALLY DEFERRED
FOR EACH ROW
EXECUTE FUNCTION check_entry_balance();

-- ============================================================
-- FUNCTION: reject_mutation
-- Entries are never deleted; lines and audit rows never change
-- ============================================================
CREATE OR REPLACE FUNCTION reject_mutation()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION '% on % is not allowed', TG_OP, TG_TABLE_NAME;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_entries_no_delete
BEFORE DELETE ON entries
FOR EACH ROW
EXECUTE FUNCTION reject_mutation();

CREATE TRIGGER trg_entry_lines_immutable
BEFORE UPDATE OR DELETE ON entry_lines
FOR EACH ROW
EXECUTE FUNCTION reject_mutation();

CREATE TRIGGER trg_audit_log_append_only
BEFORE UPDATE OR DELETE ON audit_log
FOR EACH ROW
EXECUTE FUNCTION reject_mutation();

-- ============================================================
-- FUNCTION: protect_locked_entry
-- A locked entry keeps its content; only statement linkage may change
-- ============================================================
CREATE OR REPLACE FUNCTION protect_locked_entry()
RETURNS TRIGGER AS $$
BEGIN
    IF OLD.locked_at IS NOT NULL AND (
        NEW.locked_at IS DISTINCT FROM OLD.locked_at
        OR NEW.date <> OLD.date
        OR NEW.reference <> OLD.reference
        OR NEW.memo IS DISTINCT FROM OLD.memo
        OR NEW.fiscal_year_id <> OLD.fiscal_year_id
        OR NEW.journal_id <> OLD.journal_id
    ) THEN
        RAISE EXCEPTION 'Entry % is locked', OLD.id;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_protect_locked_entry
BEFORE UPDATE ON entries
FOR EACH ROW
EXECUTE FUNCTION protect_locked_entry();
";

const DROP_SQL: &str = r"
DROP TABLE IF EXISTS compliance_exports;
DROP TABLE IF EXISTS audit_log;
DROP TABLE IF EXISTS sequence_counters;
DROP TABLE IF EXISTS entry_lines;
DROP TABLE IF EXISTS entries;
DROP TABLE IF EXISTS bank_statements;
DROP TABLE IF EXISTS bank_accounts;
DROP TABLE IF EXISTS projects;
DROP TABLE IF EXISTS accounts;
DROP TABLE IF EXISTS journals;
DROP TABLE IF EXISTS fiscal_years;
DROP TABLE IF EXISTS organizations;
DROP FUNCTION IF EXISTS protect_locked_entry();
DROP FUNCTION IF EXISTS reject_mutation();
DROP FUNCTION IF EXISTS check_entry_balance();
";
