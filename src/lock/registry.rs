// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Registry mapping resources to their locks.
//!
//! Locks are created on the first acquisition of a resource and evicted as
//! soon as nobody holds them. The registry mutex is only held for map lookups;
//! blocking acquisitions run outside it, so unrelated resources never wait on
//! each other.
//!
//! Between looking a lock up and registering a hold on it, an acquirer sees a
//! lock with zero counts. A concurrent release of the same resource must not
//! evict it in that window, or the acquirer would block on an orphaned lock.
//! Every acquisition therefore pins its lock for the whole call.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, instrument, trace};

use crate::deadlock::{DeadlockDetector, WaitForGraph};

use super::config::LockConfig;
use super::error::LockError;
use super::resource::ResourceLock;
use super::table::{LockMode, LockSnapshot, LockTable};

/// A lock pinned against eviction; unpins on drop, on every exit path.
struct PinnedLock<'a, R, O, D>
where
    R: Eq + Hash + Clone + Debug,
    O: Eq + Hash + Clone + Debug,
    D: DeadlockDetector<R, O>,
{
    registry: &'a LockRegistry<R, O, D>,
    lock: Arc<ResourceLock<R, O, D>>,
}

impl<R, O, D> Drop for PinnedLock<'_, R, O, D>
where
    R: Eq + Hash + Clone + Debug,
    O: Eq + Hash + Clone + Debug,
    D: DeadlockDetector<R, O>,
{
    fn drop(&mut self) {
        if self.lock.unpin() {
            self.registry.evict_if_idle(&self.lock);
        }
    }
}

/// Lock manager owning one [`ResourceLock`] per live resource.
pub struct LockRegistry<R, O, D = WaitForGraph<R, O>> {
    locks: Mutex<HashMap<R, Arc<ResourceLock<R, O, D>>>>,
    detector: Arc<D>,
    config: LockConfig,
}

impl<R, O> LockRegistry<R, O, WaitForGraph<R, O>>
where
    R: Eq + Hash + Clone + Debug + Send + Sync,
    O: Eq + Hash + Clone + Debug + Send + Sync,
{
    /// Creates a registry with wait-for graph deadlock detection.
    pub fn new() -> Self {
        Self::with_config(LockConfig::default())
    }

    /// Creates a registry with wait-for graph detection and the given config.
    pub fn with_config(config: LockConfig) -> Self {
        Self::with_detector(WaitForGraph::new(), config)
    }
}

impl<R, O> Default for LockRegistry<R, O, WaitForGraph<R, O>>
where
    R: Eq + Hash + Clone + Debug + Send + Sync,
    O: Eq + Hash + Clone + Debug + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R, O, D> LockRegistry<R, O, D>
where
    R: Eq + Hash + Clone + Debug,
    O: Eq + Hash + Clone + Debug,
    D: DeadlockDetector<R, O>,
{
    /// Creates a registry using `detector` for deadlock detection.
    pub fn with_detector(detector: D, config: LockConfig) -> Self {
        Self {
            locks: Mutex::new(HashMap::with_capacity(config.initial_capacity)),
            detector: Arc::new(detector),
            config,
        }
    }

    /// Returns the deadlock detector shared by all locks.
    #[inline]
    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Returns the registry configuration.
    #[inline]
    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Looks up or creates the lock for `resource` and pins it.
    fn pin(&self, resource: &R) -> PinnedLock<'_, R, O, D> {
        let mut locks = self.locks.lock();
        let lock = locks
            .entry(resource.clone())
            .or_insert_with(|| {
                trace!(resource = ?resource, "Created lock");
                Arc::new(ResourceLock::new(resource.clone(), Arc::clone(&self.detector)))
            })
            .clone();
        lock.pin();
        PinnedLock {
            registry: self,
            lock,
        }
    }

    /// Removes `lock` from the map if it is still the registered lock for its
    /// resource and nobody holds or pins it.
    fn evict_if_idle(&self, lock: &Arc<ResourceLock<R, O, D>>) {
        let mut locks = self.locks.lock();
        let registered = locks
            .get(lock.resource())
            .is_some_and(|current| Arc::ptr_eq(current, lock));
        if registered && lock.is_idle() {
            locks.remove(lock.resource());
            trace!(resource = ?lock.resource(), "Evicted idle lock");
        }
    }

    /// Acquires a lock on `resource` for `owner`.
    ///
    /// Blocks while a conflicting owner holds the resource. Fails with
    /// `LockError::DeadlockDetected` instead of blocking if the wait would
    /// close a cycle, and with `LockError::Timeout` if the configured acquire
    /// timeout elapses.
    #[instrument(level = "trace", skip(self))]
    pub fn acquire(&self, resource: &R, mode: LockMode, owner: &O) -> Result<(), LockError> {
        let pinned = self.pin(resource);
        pinned.lock.acquire(owner, mode, self.config.acquire_timeout)
    }

    /// Releases one hold of `mode` on `resource` held by `owner`.
    #[instrument(level = "trace", skip(self))]
    pub fn release(&self, resource: &R, mode: LockMode, owner: &O) -> Result<(), LockError> {
        let lock = self
            .locks
            .lock()
            .get(resource)
            .cloned()
            .ok_or_else(|| LockError::not_found(owner, resource, mode))?;

        lock.release(owner, mode)?;
        self.evict_if_idle(&lock);
        Ok(())
    }

    /// Returns a snapshot of the lock on `resource`, if one is live.
    pub fn lock_info(&self, resource: &R) -> Option<LockSnapshot<O>> {
        let lock = self.locks.lock().get(resource).cloned()?;
        Some(lock.snapshot())
    }

    /// Logs the state of the lock on `resource`.
    pub fn dump(&self, resource: &R) {
        match self.lock_info(resource) {
            Some(snapshot) => info!(resource = ?resource, "Lock state\n{}", snapshot),
            None => info!(resource = ?resource, "No lock registered"),
        }
    }

    /// Returns the number of live locks.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// Returns true if no lock is live.
    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}

impl<R, O, D> LockTable<R, O> for LockRegistry<R, O, D>
where
    R: Eq + Hash + Clone + Debug + Send + Sync,
    O: Eq + Hash + Clone + Debug + Send + Sync,
    D: DeadlockDetector<R, O>,
{
    fn acquire(&self, resource: &R, mode: LockMode, owner: &O) -> Result<(), LockError> {
        LockRegistry::acquire(self, resource, mode, owner)
    }

    fn release(&self, resource: &R, mode: LockMode, owner: &O) -> Result<(), LockError> {
        LockRegistry::release(self, resource, mode, owner)
    }

    fn lock_info(&self, resource: &R) -> Option<LockSnapshot<O>> {
        LockRegistry::lock_info(self, resource)
    }
}
