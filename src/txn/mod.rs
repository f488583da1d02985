// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction-side lock bookkeeping.
//!
//! The lock manager keeps no index from owners to the resources they hold.
//! This module tracks holds per transaction instead and hands them back to
//! the lock table when the transaction ends:
//! - Commit and abort release every hold
//! - A deadlock or lock timeout rolls the transaction back
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use graphlock::lock::{LockMode, LockRegistry};
//! use graphlock::txn::{LockingTxnManager, TxnId};
//!
//! # fn example() -> Result<(), graphlock::txn::TxnError> {
//! let registry: Arc<LockRegistry<u64, TxnId>> = Arc::new(LockRegistry::new());
//! let mgr = LockingTxnManager::new(Arc::clone(&registry));
//!
//! let mut txn = mgr.begin();
//! mgr.lock(&mut txn, 7, LockMode::Read)?;
//! mgr.lock(&mut txn, 7, LockMode::Write)?;
//!
//! mgr.commit(&mut txn)?;
//! assert!(registry.is_empty());
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

mod error;
mod manager;
mod transaction;

pub use error::TxnError;
pub use manager::LockingTxnManager;
pub use transaction::{Transaction, TxnId, TxnState};
