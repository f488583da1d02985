// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Lock manager error types.

use std::fmt::Debug;
use std::time::Duration;

use super::LockMode;

/// Errors that can occur while acquiring or releasing locks.
///
/// Owner and resource identities are carried as their `Debug` rendering so
/// the error type does not depend on the caller's identity types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    #[error("deadlock detected: {owner} waiting on {resource} would close a cycle")]
    DeadlockDetected { owner: String, resource: String },

    #[error("{owner} holds no {mode:?} lock on {resource}")]
    LockNotFound {
        owner: String,
        resource: String,
        mode: LockMode,
    },

    #[error("{owner} timed out after {waited:?} waiting on {resource}")]
    Timeout {
        owner: String,
        resource: String,
        waited: Duration,
    },
}

impl LockError {
    pub(crate) fn deadlock(owner: &impl Debug, resource: &impl Debug) -> Self {
        LockError::DeadlockDetected {
            owner: format!("{owner:?}"),
            resource: format!("{resource:?}"),
        }
    }

    pub(crate) fn not_found(owner: &impl Debug, resource: &impl Debug, mode: LockMode) -> Self {
        LockError::LockNotFound {
            owner: format!("{owner:?}"),
            resource: format!("{resource:?}"),
            mode,
        }
    }

    pub(crate) fn timeout(owner: &impl Debug, resource: &impl Debug, waited: Duration) -> Self {
        LockError::Timeout {
            owner: format!("{owner:?}"),
            resource: format!("{resource:?}"),
            waited,
        }
    }

    /// Returns true if this error means the calling transaction must roll back.
    pub fn is_deadlock(&self) -> bool {
        matches!(self, LockError::DeadlockDetected { .. })
    }
}
