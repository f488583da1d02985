// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Per-resource reentrant read/write locks.
//!
//! This module provides strict two-phase locking for records shared between
//! concurrent transactions:
//! - Reentrant read and write locks counted per owner
//! - Lock upgrade for a sole reader, read locks for the writer
//! - Deadlock detection before any owner blocks
//! - Lazy creation and eviction of per-resource locks
//!
//! # Key Concepts
//!
//! ## Owners
//!
//! An owner is whatever identifies a transaction to the lock manager. Holds
//! are tracked per owner, not per thread, so an owner may be any comparable
//! value passed explicitly with each call.
//!
//! ## Wake Policy
//!
//! Releasing the last write hold wakes queued readers oldest-first up to and
//! including the first queued writer. Releasing a read hold wakes the oldest
//! writer once every remaining read hold is its own; otherwise queued readers
//! go ahead of it. Admission is fair between modes but not strictly FIFO, and
//! a steady stream of readers can hold a writer back. A woken writer that
//! finds readers got in first wakes the readers queued at the front before it
//! queues again.
//!
//! # Example
//!
//! ```
//! use graphlock::lock::{LockMode, LockRegistry};
//!
//! let registry: LockRegistry<u64, u32> = LockRegistry::new();
//!
//! // Two owners share a read lock
//! registry.acquire(&42, LockMode::Read, &1)?;
//! registry.acquire(&42, LockMode::Read, &2)?;
//!
//! registry.release(&42, LockMode::Read, &2)?;
//!
//! // The remaining reader upgrades in place
//! registry.acquire(&42, LockMode::Write, &1)?;
//!
//! registry.release(&42, LockMode::Write, &1)?;
//! registry.release(&42, LockMode::Read, &1)?;
//! assert!(registry.is_empty());
//! # Ok::<(), graphlock::lock::LockError>(())
//! ```

mod config;
mod error;
mod registry;
mod resource;
mod table;

pub use config::LockConfig;
pub use error::LockError;
pub use registry::LockRegistry;
pub use resource::ResourceLock;
pub use table::{HoldCounts, LockMode, LockSnapshot, LockTable};
