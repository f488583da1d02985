// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Lock table trait and types.

use std::fmt;

use super::error::LockError;

/// Lock modes for read/write access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Shared lock (multiple readers allowed).
    Read,
    /// Exclusive lock (single writer, no readers other than the writer itself).
    Write,
}

/// Per-owner hold counts on a single resource lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HoldCounts {
    /// Number of read holds.
    pub read: usize,
    /// Number of write holds.
    pub write: usize,
}

impl HoldCounts {
    /// Returns true if the owner holds nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.read == 0 && self.write == 0
    }

    /// Returns the hold count for the given mode.
    #[inline]
    pub fn get(&self, mode: LockMode) -> usize {
        match mode {
            LockMode::Read => self.read,
            LockMode::Write => self.write,
        }
    }
}

/// Point-in-time view of a resource lock.
#[derive(Debug, Clone)]
pub struct LockSnapshot<O> {
    /// Total read holds across all owners.
    pub read_count: usize,
    /// Total write holds across all owners.
    pub write_count: usize,
    /// In-flight acquisitions pinning the lock in its registry.
    pub pins: usize,
    /// Queued waiters, oldest first.
    pub waiters: Vec<(O, LockMode)>,
    /// Owners with a recorded hold entry.
    pub holders: Vec<(O, HoldCounts)>,
}

impl<O> LockSnapshot<O> {
    /// Returns true if nobody holds the lock.
    pub fn is_free(&self) -> bool {
        self.read_count == 0 && self.write_count == 0
    }
}

impl<O: fmt::Debug> fmt::Display for LockSnapshot<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Total lock count: read={} write={} pins={}",
            self.read_count, self.write_count, self.pins
        )?;
        write!(f, "Waiting list:")?;
        for (i, (owner, mode)) in self.waiters.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}[{owner:?} {mode:?}]")?;
        }
        writeln!(f)?;
        write!(f, "Locking owners:")?;
        for (owner, counts) in &self.holders {
            write!(f, "\n  {:?}({}r,{}w)", owner, counts.read, counts.write)?;
        }
        Ok(())
    }
}

/// Lock table interface used by the transaction layer.
///
/// Implementations must provide deadlock detection or prevention; an
/// acquisition that would deadlock fails instead of blocking forever.
pub trait LockTable<R, O>: Send + Sync {
    /// Acquires a lock on a resource, blocking while a conflicting owner holds it.
    ///
    /// # Returns
    /// - `Ok(())` once the lock is held
    /// - `Err(LockError::DeadlockDetected)` if waiting would close a cycle
    /// - `Err(LockError::Timeout)` if a configured acquire timeout elapsed
    fn acquire(&self, resource: &R, mode: LockMode, owner: &O) -> Result<(), LockError>;

    /// Releases one hold of `mode` on a resource.
    ///
    /// Returns `Err(LockError::LockNotFound)` if the owner holds no such lock.
    fn release(&self, resource: &R, mode: LockMode, owner: &O) -> Result<(), LockError>;

    /// Releases every hold in `holds`, called at transaction end.
    ///
    /// All holds are attempted; the first failure is returned.
    fn release_all<'a, I>(&self, owner: &O, holds: I) -> Result<(), LockError>
    where
        I: IntoIterator<Item = (&'a R, LockMode)>,
        R: 'a,
    {
        let mut first_err = None;
        for (resource, mode) in holds {
            if let Err(e) = self.release(resource, mode, owner) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Returns a snapshot of the lock on a resource, if one is live.
    fn lock_info(&self, resource: &R) -> Option<LockSnapshot<O>>;
}
