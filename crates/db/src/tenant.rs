//! Request-scoped, tenant-pinned database transactions.
//!
//! A driver task owns the `DatabaseTransaction` for the whole request. The
//! request side talks to it through one-shot channels:
//!
//! ```text
//! request                         driver task
//!   │  TenantTransaction::begin      │
//!   │ ─────────────── spawn ───────▶ │ BEGIN
//!   │                                │ set_config(tenant, local)
//!   │ ◀──────────── ready ────────── │ publish handle, state = Ready
//!   │  handler runs, conn() ...      │
//!   │ ─────────── release ─────────▶ │ COMMIT / ROLLBACK
//!   │ ◀─────────── settled ───────── │ state = Committed / RolledBack
//! ```
//!
//! Dropping every handle without settling drops the release sender, and the
//! driver rolls back. An optional deadline makes the driver roll back on its
//! own when the request holds the transaction too long.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tally_shared::types::OrganizationId;
use tokio::sync::{Mutex, OnceCell, RwLock, RwLockReadGuard, oneshot};

use crate::rls::set_tenant_context;

/// Lifecycle of a tenant transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TxState {
    /// Driver is opening and scoping the transaction.
    Pending = 0,
    /// Scoped and usable.
    Ready = 1,
    /// Committed.
    Committed = 2,
    /// Rolled back, or never opened.
    RolledBack = 3,
}

impl TxState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Pending,
            1 => Self::Ready,
            2 => Self::Committed,
            _ => Self::RolledBack,
        }
    }
}

/// What the request asks the driver to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Commit the transaction.
    Commit,
    /// Roll the transaction back.
    Rollback,
}

/// Tenant transaction errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TenantTxError {
    /// A query connection was requested outside the `Ready` state.
    #[error("Tenant transaction is not ready (state: {0:?})")]
    NotReady(TxState),

    /// Beginning or scoping the transaction failed.
    #[error("Failed to open tenant transaction: {0}")]
    Open(String),

    /// Commit or rollback failed.
    #[error("Failed to settle tenant transaction: {0}")]
    Settle(String),

    /// The driver rolled back because the deadline passed.
    #[error("Tenant transaction exceeded its deadline of {0:?} and was rolled back")]
    DeadlineExceeded(Duration),

    /// The driver task stopped without reporting.
    #[error("Tenant transaction driver stopped unexpectedly")]
    DriverGone,
}

/// A query connection borrowed from a ready tenant transaction.
///
/// Holding it delays commit or rollback until it is dropped. Hold at most
/// one per task.
pub type TenantConn<'a> = RwLockReadGuard<'a, DatabaseTransaction>;

type Outcome = Result<TxState, TenantTxError>;

struct Inner {
    organization_id: OrganizationId,
    state: Arc<AtomicU8>,
    txn: Arc<RwLock<Option<DatabaseTransaction>>>,
    release: Mutex<Option<oneshot::Sender<Release>>>,
    settled: Mutex<Option<oneshot::Receiver<Outcome>>>,
    outcome: OnceCell<Outcome>,
}

/// Handle to a tenant-scoped transaction. Cheap to clone.
#[derive(Clone)]
pub struct TenantTransaction {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TenantTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantTransaction")
            .field("organization_id", &self.inner.organization_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl TenantTransaction {
    /// Opens a transaction scoped to `organization_id` and waits until it is
    /// ready.
    ///
    /// # Errors
    ///
    /// Returns `Open` if the transaction cannot be begun or scoped.
    pub async fn begin(
        db: Arc<DatabaseConnection>,
        organization_id: OrganizationId,
        deadline: Option<Duration>,
    ) -> Result<Self, TenantTxError> {
        let state = Arc::new(AtomicU8::new(TxState::Pending as u8));
        let txn = Arc::new(RwLock::new(None));
        let (ready_tx, ready_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        let (settled_tx, settled_rx) = oneshot::channel();

        tokio::spawn(drive(Driver {
            db,
            organization_id,
            state: Arc::clone(&state),
            txn: Arc::clone(&txn),
            ready: ready_tx,
            release: release_rx,
            settled: settled_tx,
            deadline,
        }));

        match ready_rx.await {
            Ok(Ok(())) => Ok(Self {
                inner: Arc::new(Inner {
                    organization_id,
                    state,
                    txn,
                    release: Mutex::new(Some(release_tx)),
                    settled: Mutex::new(Some(settled_rx)),
                    outcome: OnceCell::new(),
                }),
            }),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(TenantTxError::DriverGone),
        }
    }

    /// The tenant this transaction is scoped to.
    #[must_use]
    pub fn organization_id(&self) -> OrganizationId {
        self.inner.organization_id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TxState {
        TxState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Borrows the scoped transaction for queries.
    ///
    /// # Errors
    ///
    /// Returns `NotReady` unless the transaction is open and scoped. Never
    /// hands out a connection that is not pinned to the tenant.
    pub async fn conn(&self) -> Result<TenantConn<'_>, TenantTxError> {
        let state = self.state();
        if state != TxState::Ready {
            return Err(TenantTxError::NotReady(state));
        }

        let guard = self.inner.txn.read().await;
        RwLockReadGuard::try_map(guard, Option::as_ref)
            .map_err(|_| TenantTxError::NotReady(self.state()))
    }

    /// Commits. Idempotent: later calls return the first outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit failed or the deadline already rolled
    /// the transaction back.
    pub async fn commit(&self) -> Result<TxState, TenantTxError> {
        self.settle(Release::Commit).await
    }

    /// Rolls back. Idempotent: later calls return the first outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback failed.
    pub async fn rollback(&self) -> Result<TxState, TenantTxError> {
        match self.settle(Release::Rollback).await {
            Err(TenantTxError::DeadlineExceeded(_)) => Ok(TxState::RolledBack),
            other => other,
        }
    }

    async fn settle(&self, release: Release) -> Outcome {
        self.inner
            .outcome
            .get_or_init(|| async {
                if let Some(sender) = self.inner.release.lock().await.take() {
                    // The driver may already have settled on its own.
                    let _ = sender.send(release);
                }
                let Some(settled) = self.inner.settled.lock().await.take() else {
                    return Err(TenantTxError::DriverGone);
                };
                settled.await.unwrap_or(Err(TenantTxError::DriverGone))
            })
            .await
            .clone()
    }
}

/// Why the driver is settling.
#[derive(Debug, Clone, Copy)]
enum Trigger {
    Requested(Release),
    Abandoned,
    Deadline(Duration),
}

impl Trigger {
    const fn action(self) -> Release {
        match self {
            Self::Requested(release) => release,
            Self::Abandoned | Self::Deadline(_) => Release::Rollback,
        }
    }
}

struct Driver {
    db: Arc<DatabaseConnection>,
    organization_id: OrganizationId,
    state: Arc<AtomicU8>,
    txn: Arc<RwLock<Option<DatabaseTransaction>>>,
    ready: oneshot::Sender<Result<(), TenantTxError>>,
    release: oneshot::Receiver<Release>,
    settled: oneshot::Sender<Outcome>,
    deadline: Option<Duration>,
}

async fn drive(driver: Driver) {
    let Driver {
        db,
        organization_id,
        state,
        txn: slot,
        ready,
        release,
        settled,
        deadline,
    } = driver;

    let txn = match db.begin().await {
        Ok(txn) => txn,
        Err(err) => {
            tracing::error!(%organization_id, error = %err, "Failed to begin tenant transaction");
            state.store(TxState::RolledBack as u8, Ordering::Release);
            let _ = ready.send(Err(TenantTxError::Open(err.to_string())));
            return;
        }
    };

    if let Err(err) = set_tenant_context(&txn, organization_id).await {
        tracing::error!(%organization_id, error = %err, "Failed to scope tenant transaction");
        // Dropping the transaction rolls it back.
        drop(txn);
        state.store(TxState::RolledBack as u8, Ordering::Release);
        let _ = ready.send(Err(TenantTxError::Open(err.to_string())));
        return;
    }

    *slot.write().await = Some(txn);
    state.store(TxState::Ready as u8, Ordering::Release);
    tracing::debug!(%organization_id, "Tenant transaction ready");

    let trigger = if ready.send(Ok(())).is_err() {
        Trigger::Abandoned
    } else {
        match deadline {
            Some(limit) => match tokio::time::timeout(limit, release).await {
                Ok(received) => received.map_or(Trigger::Abandoned, Trigger::Requested),
                Err(_) => {
                    tracing::warn!(%organization_id, ?limit, "Tenant transaction deadline exceeded");
                    Trigger::Deadline(limit)
                }
            },
            None => release.await.map_or(Trigger::Abandoned, Trigger::Requested),
        }
    };

    // Waits for outstanding connection borrows to be dropped.
    let Some(txn) = slot.write().await.take() else {
        state.store(TxState::RolledBack as u8, Ordering::Release);
        let _ = settled.send(Err(TenantTxError::DriverGone));
        return;
    };

    let action = trigger.action();
    let result = match action {
        Release::Commit => txn.commit().await.map(|()| TxState::Committed),
        Release::Rollback => txn.rollback().await.map(|()| TxState::RolledBack),
    };

    let outcome = match result {
        Ok(final_state) => {
            state.store(final_state as u8, Ordering::Release);
            tracing::debug!(%organization_id, state = ?final_state, "Tenant transaction settled");
            match trigger {
                Trigger::Deadline(limit) => Err(TenantTxError::DeadlineExceeded(limit)),
                Trigger::Requested(_) | Trigger::Abandoned => Ok(final_state),
            }
        }
        Err(err) => {
            // A failed commit leaves nothing applied.
            state.store(TxState::RolledBack as u8, Ordering::Release);
            tracing::error!(%organization_id, ?action, error = %err, "Failed to settle tenant transaction");
            Err(TenantTxError::Settle(err.to_string()))
        }
    };

    let _ = settled.send(outcome);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trip() {
        for state in [
            TxState::Pending,
            TxState::Ready,
            TxState::Committed,
            TxState::RolledBack,
        ] {
            assert_eq!(TxState::from_u8(state as u8), state);
        }
    }

    #[tokio::test]
    async fn test_begin_fails_fast_without_a_database() {
        let result = TenantTransaction::begin(
            Arc::new(DatabaseConnection::Disconnected),
            OrganizationId::new(),
            None,
        )
        .await;

        assert!(matches!(result, Err(TenantTxError::Open(_))), "{result:?}");
    }

    #[test]
    fn test_not_ready_error_names_state() {
        let err = TenantTxError::NotReady(TxState::Committed);
        assert_eq!(
            err.to_string(),
            "Tenant transaction is not ready (state: Committed)"
        );
    }
}
