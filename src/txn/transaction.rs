// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction handle and state.

use crate::lock::LockMode;

/// Unique transaction identifier, used as the lock owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxnId(pub u64);

/// Transaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Active,
    Committed,
    Aborted,
}

/// A transaction handle.
///
/// Tracks every lock hold the transaction took so they can all be released
/// when it ends. The lock manager itself keeps no per-owner index.
#[derive(Debug)]
pub struct Transaction<R> {
    /// Unique identifier for this transaction.
    pub(crate) id: TxnId,
    /// Current state of the transaction.
    pub(crate) state: TxnState,
    /// One entry per hold, in acquisition order.
    pub(crate) holds: Vec<(R, LockMode)>,
}

impl<R: PartialEq> Transaction<R> {
    /// Creates a new transaction.
    pub(crate) fn new(id: TxnId) -> Self {
        Self {
            id,
            state: TxnState::Active,
            holds: Vec::new(),
        }
    }

    /// Returns the transaction ID.
    #[inline]
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// Returns the current state.
    #[inline]
    pub fn state(&self) -> TxnState {
        self.state
    }

    /// Returns true if the transaction is active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == TxnState::Active
    }

    /// Returns true if the transaction is committed.
    #[inline]
    pub fn is_committed(&self) -> bool {
        self.state == TxnState::Committed
    }

    /// Returns true if the transaction is aborted.
    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.state == TxnState::Aborted
    }

    /// Returns the number of lock holds taken and not yet released.
    #[inline]
    pub fn lock_count(&self) -> usize {
        self.holds.len()
    }

    /// Returns the holds in acquisition order.
    pub fn holds(&self) -> &[(R, LockMode)] {
        &self.holds
    }

    /// Returns true if the transaction holds `resource` in `mode`.
    pub fn holds_lock(&self, resource: &R, mode: LockMode) -> bool {
        self.holds.iter().any(|(r, m)| r == resource && *m == mode)
    }

    /// Forgets the most recent matching hold. Returns false if there is none.
    pub(crate) fn forget_hold(&mut self, resource: &R, mode: LockMode) -> bool {
        match self
            .holds
            .iter()
            .rposition(|(r, m)| r == resource && *m == mode)
        {
            Some(pos) => {
                self.holds.remove(pos);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_txn_new() {
        let txn: Transaction<u64> = Transaction::new(TxnId(1));

        assert_eq!(txn.id(), TxnId(1));
        assert_eq!(txn.state(), TxnState::Active);
        assert!(txn.is_active());
        assert!(!txn.is_committed());
        assert!(!txn.is_aborted());
        assert_eq!(txn.lock_count(), 0);
    }

    #[test]
    fn test_forget_hold() {
        let mut txn = Transaction::new(TxnId(1));
        txn.holds.push((7u64, LockMode::Read));
        txn.holds.push((8u64, LockMode::Write));
        txn.holds.push((7u64, LockMode::Read));

        assert!(txn.forget_hold(&7, LockMode::Read));
        assert_eq!(txn.lock_count(), 2);
        assert!(txn.holds_lock(&7, LockMode::Read));

        assert!(!txn.forget_hold(&7, LockMode::Write));
        assert!(txn.forget_hold(&7, LockMode::Read));
        assert!(!txn.holds_lock(&7, LockMode::Read));
        assert_eq!(txn.holds(), &[(8, LockMode::Write)]);
    }

    #[test]
    fn test_txn_id_hash() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(TxnId(1));
        set.insert(TxnId(2));
        assert!(set.contains(&TxnId(1)));
        assert!(!set.contains(&TxnId(3)));
    }
}
