// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Deadlock detection.
//!
//! A [`ResourceLock`](crate::lock::ResourceLock) consults a [`DeadlockDetector`]
//! before it lets an owner sleep. The detector sees every hold and every wait,
//! so it can refuse a wait that would close a cycle.
//!
//! # Wait-For Graph
//!
//! [`WaitForGraph`] keeps, for every resource, the owners holding it, and for
//! every blocked owner, the resource it waits on. An edge `A -> B` exists when
//! A waits on a resource B holds. Before A blocks on resource R, the graph
//! walks from each holder of R along wait edges; reaching A again means the
//! wait would deadlock, and A's acquisition fails instead.
//!
//! [`NoDetection`] accepts every wait. Pair it with an acquire timeout, or use
//! it where a single writer makes cycles impossible.

mod none;
mod wait_for;

pub use none::NoDetection;
pub use wait_for::WaitForGraph;

use crate::lock::LockError;

/// Deadlock detection strategy consulted by resource locks.
///
/// All methods are called while the calling resource lock's own mutex is
/// held, so implementations must never call back into a lock. `check_wait_on`
/// must not block.
pub trait DeadlockDetector<R, O>: Send + Sync {
    /// Registers that `owner` is about to wait on `resource`.
    ///
    /// Returns `Err(LockError::DeadlockDetected)` if the wait would close a
    /// cycle; the wait is then not registered and the caller must not block.
    fn check_wait_on(&self, owner: &O, resource: &R) -> Result<(), LockError>;

    /// Removes the wait registered by the matching `check_wait_on`.
    fn stop_wait_on(&self, owner: &O, resource: &R);

    /// Records that `owner` took its first hold on `resource`.
    fn lock_acquired(&self, owner: &O, resource: &R);

    /// Records that `owner` dropped its last hold on `resource`.
    fn lock_released(&self, owner: &O, resource: &R);
}
