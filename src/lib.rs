// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! graphlock: per-resource reentrant read/write locking with deadlock detection
//!
//! This crate provides the concurrency-control core of a transactional graph
//! store: strict two-phase locking over nodes, relationships and properties,
//! with deadlock cycles detected before any transaction blocks.

pub mod deadlock;
pub mod lock;
pub mod txn;

pub use deadlock::{DeadlockDetector, NoDetection, WaitForGraph};
pub use lock::{
    HoldCounts, LockConfig, LockError, LockMode, LockRegistry, LockSnapshot, LockTable,
    ResourceLock,
};
pub use txn::{LockingTxnManager, Transaction, TxnError, TxnId, TxnState};
