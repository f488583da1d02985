// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction error types.

use crate::lock::LockError;

/// Errors that can occur in transaction lock operations.
#[derive(Debug, thiserror::Error)]
pub enum TxnError {
    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    #[error("transaction already committed")]
    AlreadyCommitted,

    #[error("transaction already aborted")]
    AlreadyAborted,
}

impl TxnError {
    /// Returns true if the transaction was rolled back because of a deadlock.
    pub fn is_deadlock(&self) -> bool {
        matches!(self, TxnError::Lock(e) if e.is_deadlock())
    }
}
