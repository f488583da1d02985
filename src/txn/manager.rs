// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction manager driving a lock table.

use std::marker::PhantomData;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::lock::{LockError, LockMode, LockTable};

use super::error::TxnError;
use super::transaction::{Transaction, TxnId, TxnState};

/// Transaction manager holding locks under strict two-phase locking.
///
/// Locks are taken as the transaction goes and all released together at
/// commit or abort. A deadlock or lock timeout rolls the transaction back
/// before the error is returned.
pub struct LockingTxnManager<R, L: LockTable<R, TxnId>> {
    lock_table: Arc<L>,
    next_txn_id: AtomicU64,
    _resource: PhantomData<fn() -> R>,
}

impl<R, L> LockingTxnManager<R, L>
where
    R: PartialEq,
    L: LockTable<R, TxnId>,
{
    /// Creates a new transaction manager.
    pub fn new(lock_table: Arc<L>) -> Self {
        Self {
            lock_table,
            next_txn_id: AtomicU64::new(1),
            _resource: PhantomData,
        }
    }

    /// Returns the lock table.
    #[inline]
    pub fn lock_table(&self) -> &L {
        &self.lock_table
    }

    /// Begins a new transaction.
    pub fn begin(&self) -> Transaction<R> {
        let id = TxnId(self.next_txn_id.fetch_add(1, Ordering::Relaxed));
        Transaction::new(id)
    }

    /// Acquires a lock on `resource` for the transaction.
    ///
    /// On deadlock or timeout the transaction is aborted and all its locks
    /// are released before the error is returned.
    pub fn lock(
        &self,
        txn: &mut Transaction<R>,
        resource: R,
        mode: LockMode,
    ) -> Result<(), TxnError> {
        ensure_active(txn)?;

        match self.lock_table.acquire(&resource, mode, &txn.id) {
            Ok(()) => {
                txn.holds.push((resource, mode));
                Ok(())
            }
            Err(e @ (LockError::DeadlockDetected { .. } | LockError::Timeout { .. })) => {
                warn!(txn_id = txn.id.0, error = %e, "Rolling back transaction");
                if let Err(release_err) = self.release_holds(txn) {
                    warn!(txn_id = txn.id.0, error = %release_err, "Rollback release failed");
                }
                txn.state = TxnState::Aborted;
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Releases one hold before the transaction ends.
    pub fn unlock(
        &self,
        txn: &mut Transaction<R>,
        resource: &R,
        mode: LockMode,
    ) -> Result<(), TxnError> {
        ensure_active(txn)?;

        self.lock_table.release(resource, mode, &txn.id)?;
        txn.forget_hold(resource, mode);
        Ok(())
    }

    /// Commits the transaction, releasing all its locks.
    pub fn commit(&self, txn: &mut Transaction<R>) -> Result<(), TxnError> {
        ensure_active(txn)?;

        let released = self.release_holds(txn);
        txn.state = TxnState::Committed;
        debug!(txn_id = txn.id.0, "Committed");
        released
    }

    /// Aborts the transaction, releasing all its locks.
    pub fn abort(&self, txn: &mut Transaction<R>) -> Result<(), TxnError> {
        ensure_active(txn)?;

        let released = self.release_holds(txn);
        txn.state = TxnState::Aborted;
        debug!(txn_id = txn.id.0, "Aborted");
        released
    }

    /// Releases every recorded hold, newest first.
    fn release_holds(&self, txn: &mut Transaction<R>) -> Result<(), TxnError> {
        let holds = mem::take(&mut txn.holds);
        self.lock_table
            .release_all(&txn.id, holds.iter().rev().map(|(r, m)| (r, *m)))?;
        Ok(())
    }
}

fn ensure_active<R>(txn: &Transaction<R>) -> Result<(), TxnError> {
    match txn.state {
        TxnState::Active => Ok(()),
        TxnState::Committed => Err(TxnError::AlreadyCommitted),
        TxnState::Aborted => Err(TxnError::AlreadyAborted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::LockRegistry;
    use std::sync::{mpsc, Barrier};
    use std::thread;
    use std::time::Duration;

    type TestManager = LockingTxnManager<u64, LockRegistry<u64, TxnId>>;

    fn create_test_manager() -> Arc<TestManager> {
        Arc::new(LockingTxnManager::new(Arc::new(LockRegistry::new())))
    }

    #[test]
    fn test_begin() {
        let mgr = create_test_manager();
        let txn1 = mgr.begin();
        let txn2 = mgr.begin();

        assert!(txn1.is_active());
        assert!(txn2.id() > txn1.id());
    }

    #[test]
    fn test_commit_releases_all() {
        let mgr = create_test_manager();
        let mut txn = mgr.begin();

        mgr.lock(&mut txn, 1, LockMode::Read).unwrap();
        mgr.lock(&mut txn, 1, LockMode::Write).unwrap();
        mgr.lock(&mut txn, 2, LockMode::Write).unwrap();
        assert_eq!(txn.lock_count(), 3);
        assert_eq!(mgr.lock_table().len(), 2);

        mgr.commit(&mut txn).unwrap();
        assert!(txn.is_committed());
        assert_eq!(txn.lock_count(), 0);
        assert!(mgr.lock_table().is_empty());
    }

    #[test]
    fn test_abort_releases_all() {
        let mgr = create_test_manager();
        let mut txn = mgr.begin();
        mgr.lock(&mut txn, 1, LockMode::Write).unwrap();

        mgr.abort(&mut txn).unwrap();
        assert!(txn.is_aborted());
        assert!(mgr.lock_table().is_empty());

        // Further operations should fail
        assert!(matches!(
            mgr.lock(&mut txn, 1, LockMode::Read),
            Err(TxnError::AlreadyAborted)
        ));
    }

    #[test]
    fn test_double_commit() {
        let mgr = create_test_manager();
        let mut txn = mgr.begin();
        mgr.commit(&mut txn).unwrap();

        let result = mgr.commit(&mut txn);
        assert!(matches!(result, Err(TxnError::AlreadyCommitted)));
    }

    #[test]
    fn test_unlock() {
        let mgr = create_test_manager();
        let mut txn = mgr.begin();
        mgr.lock(&mut txn, 1, LockMode::Read).unwrap();
        mgr.lock(&mut txn, 2, LockMode::Read).unwrap();

        mgr.unlock(&mut txn, &1, LockMode::Read).unwrap();
        assert_eq!(txn.lock_count(), 1);
        assert_eq!(mgr.lock_table().len(), 1);

        let err = mgr.unlock(&mut txn, &1, LockMode::Read).unwrap_err();
        assert!(matches!(
            err,
            TxnError::Lock(LockError::LockNotFound { .. })
        ));
        assert!(txn.is_active());

        mgr.commit(&mut txn).unwrap();
        assert!(mgr.lock_table().is_empty());
    }

    #[test]
    fn test_deadlock_rolls_back() {
        let mgr = create_test_manager();
        let barrier = Arc::new(Barrier::new(2));
        let (tx, rx) = mpsc::channel();

        let handles: Vec<_> = [(10u64, 20u64), (20, 10)]
            .into_iter()
            .map(|(first, second)| {
                let mgr = Arc::clone(&mgr);
                let barrier = Arc::clone(&barrier);
                let tx = tx.clone();
                thread::spawn(move || {
                    let mut txn = mgr.begin();
                    mgr.lock(&mut txn, first, LockMode::Write).unwrap();
                    barrier.wait();
                    let result = mgr.lock(&mut txn, second, LockMode::Write);
                    let deadlocked = matches!(&result, Err(e) if e.is_deadlock());
                    if deadlocked {
                        assert!(txn.is_aborted());
                        assert_eq!(txn.lock_count(), 0);
                    } else {
                        result.unwrap();
                        mgr.commit(&mut txn).unwrap();
                    }
                    tx.send(deadlocked).unwrap();
                })
            })
            .collect();

        let outcomes: Vec<bool> = (0..2)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(outcomes.iter().filter(|d| **d).count(), 1);
        assert!(mgr.lock_table().is_empty());
    }
}
