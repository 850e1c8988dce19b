//! Integration tests for the ledger write path: references, locks,
//! reversals, bank statements and compliance exports.
//!
//! Requires a running `PostgreSQL` database with migrations applied.

mod common;

use std::sync::Arc;

use futures::future::join_all;
use rust_decimal_macros::dec;
use sea_orm::DatabaseConnection;
use tally_core::ledger::{
    CreateEntryInput, EntryLine, LedgerError, RecordBankStatementInput, ReverseEntryInput,
};
use tally_db::repositories::{
    BankStatementRepository, EntryRepository, EntryWithLines, FiscalYearRepository,
    RepositoryError,
};
use tally_db::TenantTransaction;
use tally_shared::types::EntryId;

use common::{Tenant, admin_db, app_db, date, deposit, insert_project, seed_tenant};

async fn post(
    app: &Arc<DatabaseConnection>,
    tenant: &Tenant,
    input: CreateEntryInput,
) -> Result<EntryWithLines, RepositoryError> {
    let tx = TenantTransaction::begin(app.clone(), tenant.organization_id, None)
        .await
        .unwrap();
    let result = {
        let conn = tx.conn().await.unwrap();
        EntryRepository::new(&*conn)
            .create(tenant.organization_id, tenant.user_id, input)
            .await
    };
    if result.is_ok() {
        tx.commit().await.unwrap();
    } else {
        tx.rollback().await.unwrap();
    }
    result
}

fn ledger_error(result: Result<impl std::fmt::Debug, RepositoryError>) -> LedgerError {
    match result {
        Err(RepositoryError::Ledger(err)) => err,
        other => panic!("expected a ledger error, got {other:?}"),
    }
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_references_follow_journal_sequence() {
    let admin = admin_db().await;
    let tenant = seed_tenant(&admin, "References").await;
    let app = app_db().await;

    let first = post(&app, &tenant, deposit(&tenant, date(2025, 2, 3), dec!(150.00)))
        .await
        .unwrap();
    let second = post(&app, &tenant, deposit(&tenant, date(2025, 2, 4), dec!(80.00)))
        .await
        .unwrap();

    assert_eq!(first.entry.reference, "2025-BAN-000001");
    assert_eq!(second.entry.reference, "2025-BAN-000002");
    assert_eq!(first.lines.len(), 2);
    assert_eq!(first.lines[0].line_no, 1);
    assert_eq!(first.lines[1].line_no, 2);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_other_tenants_references_are_not_found() {
    let admin = admin_db().await;
    let tenant = seed_tenant(&admin, "Owner").await;
    let other = seed_tenant(&admin, "Neighbour").await;
    let foreign_project = insert_project(&admin, &other, "P-OTHER").await;
    let app = app_db().await;
    let on = date(2025, 3, 10);

    let mut input = deposit(&tenant, on, dec!(25.00));
    input.journal_id = other.journal_id;
    let err = ledger_error(post(&app, &tenant, input).await);
    assert!(
        matches!(err, LedgerError::JournalNotFound(id) if id == other.journal_id.into_inner()),
        "{err:?}"
    );

    let mut input = deposit(&tenant, on, dec!(25.00));
    input.lines[1].account_id = other.expense_account;
    let err = ledger_error(post(&app, &tenant, input).await);
    assert!(
        matches!(err, LedgerError::AccountNotFound(id) if id == other.expense_account.into_inner()),
        "{err:?}"
    );

    let mut input = deposit(&tenant, on, dec!(25.00));
    input.lines[1].project_id = Some(foreign_project);
    let err = ledger_error(post(&app, &tenant, input).await);
    assert!(
        matches!(err, LedgerError::ProjectNotFound(id) if id == foreign_project.into_inner()),
        "{err:?}"
    );
    assert_eq!(err.http_status_code(), 404);

    // None of the rejections consumed a sequence number.
    let accepted = post(&app, &tenant, deposit(&tenant, on, dec!(25.00)))
        .await
        .unwrap();
    assert_eq!(accepted.entry.reference, "2025-BAN-000001");
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_concurrent_postings_get_distinct_sequences() {
    const WRITERS: i64 = 16;

    let admin = admin_db().await;
    let tenant = seed_tenant(&admin, "Concurrency").await;
    let app = app_db().await;

    let tasks = (0..WRITERS).map(|_| {
        let app = app.clone();
        tokio::spawn(async move {
            post(&app, &tenant, deposit(&tenant, date(2025, 6, 1), dec!(1.00)))
                .await
                .map(|posted| posted.entry.sequence)
        })
    });

    let mut sequences: Vec<i64> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();
    sequences.sort_unstable();

    assert_eq!(sequences, (1..=WRITERS).collect::<Vec<_>>());
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_rejected_entries_do_not_consume_sequence() {
    let admin = admin_db().await;
    let tenant = seed_tenant(&admin, "Rejections").await;
    let app = app_db().await;

    let unbalanced = CreateEntryInput {
        lines: vec![
            EntryLine::debit(tenant.bank_ledger_account, dec!(100.00)),
            EntryLine::credit(tenant.expense_account, dec!(99.99)),
        ],
        ..deposit(&tenant, date(2025, 5, 1), dec!(0))
    };
    let err = ledger_error(post(&app, &tenant, unbalanced).await);
    assert!(matches!(err, LedgerError::UnbalancedEntry { .. }));

    let outside = deposit(&tenant, date(2026, 1, 1), dec!(10.00));
    let err = ledger_error(post(&app, &tenant, outside).await);
    assert!(matches!(err, LedgerError::DateOutsideFiscalYear { .. }));

    let posted = post(&app, &tenant, deposit(&tenant, date(2025, 5, 2), dec!(10.00)))
        .await
        .unwrap();
    assert_eq!(posted.entry.reference, "2025-BAN-000001");
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_locked_fiscal_year_rejects_postings() {
    let admin = admin_db().await;
    let tenant = seed_tenant(&admin, "Year lock").await;
    let app = app_db().await;

    let tx = TenantTransaction::begin(app.clone(), tenant.organization_id, None)
        .await
        .unwrap();
    {
        let conn = tx.conn().await.unwrap();
        let locked = FiscalYearRepository::new(&*conn)
            .lock(tenant.organization_id, tenant.fiscal_year_id, tenant.user_id)
            .await
            .unwrap();
        assert!(locked.locked_at.is_some());
    }
    tx.commit().await.unwrap();

    let err = ledger_error(
        post(&app, &tenant, deposit(&tenant, date(2025, 7, 1), dec!(10.00))).await,
    );
    assert!(matches!(err, LedgerError::FiscalYearLocked(_)));
    assert_eq!(err.http_status_code(), 422);

    let tx = TenantTransaction::begin(app.clone(), tenant.organization_id, None)
        .await
        .unwrap();
    {
        let conn = tx.conn().await.unwrap();
        let repo = FiscalYearRepository::new(&*conn);
        let err = ledger_error(
            repo.lock(tenant.organization_id, tenant.fiscal_year_id, tenant.user_id)
                .await,
        );
        assert!(matches!(err, LedgerError::FiscalYearAlreadyLocked(_)));

        let unlocked = repo
            .unlock(tenant.organization_id, tenant.fiscal_year_id, tenant.user_id)
            .await
            .unwrap();
        assert!(unlocked.locked_at.is_none());
    }
    tx.commit().await.unwrap();

    let posted = post(&app, &tenant, deposit(&tenant, date(2025, 7, 1), dec!(10.00)))
        .await
        .unwrap();
    assert_eq!(posted.entry.reference, "2025-BAN-000001");
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_entry_lock_is_one_way() {
    let admin = admin_db().await;
    let tenant = seed_tenant(&admin, "Entry lock").await;
    let app = app_db().await;

    let posted = post(&app, &tenant, deposit(&tenant, date(2025, 3, 3), dec!(42.00)))
        .await
        .unwrap();
    let entry_id = EntryId::from_uuid(posted.entry.id);

    let tx = TenantTransaction::begin(app.clone(), tenant.organization_id, None)
        .await
        .unwrap();
    {
        let conn = tx.conn().await.unwrap();
        let repo = EntryRepository::new(&*conn);

        let locked = repo
            .lock(tenant.organization_id, entry_id, tenant.user_id)
            .await
            .unwrap();
        assert!(locked.locked_at.is_some());
        assert_eq!(locked.locked_by, Some(tenant.user_id.into_inner()));

        let err = ledger_error(repo.lock(tenant.organization_id, entry_id, tenant.user_id).await);
        assert!(matches!(err, LedgerError::EntryAlreadyLocked(_)));
        assert_eq!(err.http_status_code(), 409);

        let err = ledger_error(
            repo.lock(tenant.organization_id, EntryId::new(), tenant.user_id)
                .await,
        );
        assert!(matches!(err, LedgerError::EntryNotFound(_)));
    }
    tx.commit().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_reversal_mirrors_original() {
    let admin = admin_db().await;
    let tenant = seed_tenant(&admin, "Reversal").await;
    let app = app_db().await;

    let original = post(&app, &tenant, deposit(&tenant, date(2025, 4, 1), dec!(250.00)))
        .await
        .unwrap();

    let tx = TenantTransaction::begin(app.clone(), tenant.organization_id, None)
        .await
        .unwrap();
    let reversal = {
        let conn = tx.conn().await.unwrap();
        EntryRepository::new(&*conn)
            .reverse(
                tenant.organization_id,
                EntryId::from_uuid(original.entry.id),
                tenant.user_id,
                ReverseEntryInput::default(),
                date(2025, 4, 30),
            )
            .await
            .unwrap()
    };
    tx.commit().await.unwrap();

    assert_eq!(reversal.entry.reference, "2025-BAN-000002");
    assert_eq!(reversal.entry.reversal_of, Some(original.entry.id));
    assert_eq!(reversal.entry.date, date(2025, 4, 30));
    assert_eq!(reversal.entry.memo.as_deref(), Some("Reversal of 2025-BAN-000001"));
    for (orig, rev) in original.lines.iter().zip(&reversal.lines) {
        assert_eq!(orig.account_id, rev.account_id);
        assert_eq!(orig.debit, rev.credit);
        assert_eq!(orig.credit, rev.debit);
    }
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_bank_statement_must_balance_before_linking() {
    let admin = admin_db().await;
    let tenant = seed_tenant(&admin, "Statements").await;
    let app = app_db().await;

    let deposit_entry = post(&app, &tenant, deposit(&tenant, date(2025, 1, 10), dec!(200.00)))
        .await
        .unwrap();
    let entry_id = EntryId::from_uuid(deposit_entry.entry.id);

    let statement = |closing| RecordBankStatementInput {
        bank_account_id: tenant.bank_account_id,
        period_start: date(2025, 1, 1),
        period_end: date(2025, 1, 31),
        opening_balance: dec!(1000.00),
        closing_balance: closing,
        entry_ids: vec![entry_id],
    };

    let tx = TenantTransaction::begin(app.clone(), tenant.organization_id, None)
        .await
        .unwrap();
    {
        let conn = tx.conn().await.unwrap();
        let err = ledger_error(
            BankStatementRepository::new(&*conn)
                .record(tenant.organization_id, tenant.user_id, statement(dec!(1100.00)))
                .await,
        );
        match err {
            LedgerError::StatementBalanceMismatch { expected, computed } => {
                assert_eq!(expected, dec!(1100.00));
                assert_eq!(computed, dec!(1200.00));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let unlinked = EntryRepository::new(&*conn)
            .find_with_lines(entry_id)
            .await
            .unwrap();
        assert!(unlinked.entry.bank_statement_id.is_none());
    }
    tx.rollback().await.unwrap();

    let tx = TenantTransaction::begin(app.clone(), tenant.organization_id, None)
        .await
        .unwrap();
    {
        let conn = tx.conn().await.unwrap();
        let recorded = BankStatementRepository::new(&*conn)
            .record(tenant.organization_id, tenant.user_id, statement(dec!(1200.00)))
            .await
            .unwrap();
        assert_eq!(recorded.entry_ids, vec![entry_id.into_inner()]);

        let linked = EntryRepository::new(&*conn)
            .find_with_lines(entry_id)
            .await
            .unwrap();
        assert_eq!(linked.entry.bank_statement_id, Some(recorded.statement.id));
    }
    tx.commit().await.unwrap();

    let tx = TenantTransaction::begin(app.clone(), tenant.organization_id, None)
        .await
        .unwrap();
    {
        let conn = tx.conn().await.unwrap();
        let err = ledger_error(
            BankStatementRepository::new(&*conn)
                .record(tenant.organization_id, tenant.user_id, statement(dec!(1200.00)))
                .await,
        );
        assert!(matches!(err, LedgerError::EntryAlreadyReconciled(_)));
    }
    tx.rollback().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_compliance_export_requires_locked_year() {
    let admin = admin_db().await;
    let tenant = seed_tenant(&admin, "Export").await;
    let app = app_db().await;

    post(&app, &tenant, deposit(&tenant, date(2025, 9, 1), dec!(75.00)))
        .await
        .unwrap();

    let tx = TenantTransaction::begin(app.clone(), tenant.organization_id, None)
        .await
        .unwrap();
    {
        let conn = tx.conn().await.unwrap();
        let repo = FiscalYearRepository::new(&*conn);

        let err = ledger_error(
            repo.export(tenant.organization_id, tenant.fiscal_year_id, tenant.user_id)
                .await,
        );
        assert!(matches!(err, LedgerError::FiscalYearNotLockedForExport(_)));

        repo.lock(tenant.organization_id, tenant.fiscal_year_id, tenant.user_id)
            .await
            .unwrap();
        let export = repo
            .export(tenant.organization_id, tenant.fiscal_year_id, tenant.user_id)
            .await
            .unwrap();

        assert_eq!(export.row_count, 2);
        assert_eq!(export.checksum.len(), 64);
        assert!(export.content.contains("2025-BAN-000001"));
    }
    tx.commit().await.unwrap();
}
