// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Reentrant read/write lock for a single resource.
//!
//! Many owners may hold read locks at once as long as no other owner holds the
//! write lock. An owner holding the write lock may also take read locks, and an
//! owner that is the only reader may take the write lock (upgrade). Holds are
//! counted per owner and must be released as many times as they were taken.
//!
//! Blocked owners are queued. A release wakes only the waiters that can make
//! progress, and every wait is first cleared with the deadlock detector so an
//! owner never sleeps in a cycle.

use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::deadlock::{DeadlockDetector, WaitForGraph};

use super::error::LockError;
use super::table::{HoldCounts, LockMode, LockSnapshot};

/// Wake-up slot owned by one blocked acquisition.
///
/// `woken` is only written with the lock's mutex held; the atomic just lets
/// the slot be shared between the queue and the sleeping thread.
#[derive(Default)]
struct WaitSignal {
    cond: Condvar,
    woken: AtomicBool,
}

struct WaitRequest<O> {
    owner: O,
    mode: LockMode,
    signal: Arc<WaitSignal>,
}

impl<O> WaitRequest<O> {
    fn wake(self) {
        self.signal.woken.store(true, Ordering::Relaxed);
        self.signal.cond.notify_one();
    }
}

struct LockState<O> {
    read_count: usize,
    write_count: usize,
    pins: usize,
    /// Oldest waiter first.
    waiters: VecDeque<WaitRequest<O>>,
    holders: HashMap<O, HoldCounts>,
}

impl<O: Eq + Hash + Clone> LockState<O> {
    fn held_by(&self, owner: &O) -> HoldCounts {
        self.holders.get(owner).copied().unwrap_or_default()
    }

    fn must_wait(&self, owner: &O, mode: LockMode) -> bool {
        let held = self.held_by(owner);
        match mode {
            LockMode::Read => self.write_count > held.write,
            LockMode::Write => self.write_count > held.write || self.read_count > held.read,
        }
    }

    /// Records a hold and returns true if it is the owner's first.
    fn grant(&mut self, owner: &O, mode: LockMode) -> bool {
        let counts = self.holders.entry(owner.clone()).or_default();
        let first = counts.is_empty();
        match mode {
            LockMode::Read => {
                counts.read += 1;
                self.read_count += 1;
            }
            LockMode::Write => {
                counts.write += 1;
                self.write_count += 1;
            }
        }
        first
    }

    /// True if every remaining read hold belongs to the waiting writer.
    fn has_read_quorum(&self, request: &WaitRequest<O>) -> bool {
        self.read_count == self.held_by(&request.owner).read
    }

    fn wake_after_read_release(&mut self) {
        let Some(oldest) = self.waiters.front() else {
            return;
        };

        let oldest_mode = oldest.mode;
        match oldest_mode {
            LockMode::Write => {
                if self.has_read_quorum(oldest) {
                    if let Some(writer) = self.waiters.pop_front() {
                        writer.wake();
                    }
                    return;
                }
                // Oldest writer still waits for other readers. Let queued
                // readers through and at most one writer that now has every
                // read hold.
                let mut i = 1;
                while i < self.waiters.len() {
                    let request = &self.waiters[i];
                    let eligible_writer =
                        request.mode == LockMode::Write && self.has_read_quorum(request);
                    if request.mode == LockMode::Read || eligible_writer {
                        if let Some(request) = self.waiters.remove(i) {
                            request.wake();
                        }
                        if eligible_writer {
                            break;
                        }
                    } else {
                        i += 1;
                    }
                }
            }
            LockMode::Read => {
                if self.write_count == 0 {
                    if let Some(reader) = self.waiters.pop_front() {
                        reader.wake();
                    }
                }
            }
        }
    }

    /// Wakes readers oldest-first up to and including the first writer.
    fn wake_after_write_release(&mut self) {
        while let Some(request) = self.waiters.pop_front() {
            let mode = request.mode;
            request.wake();
            if mode == LockMode::Write {
                break;
            }
        }
    }

    /// Wakes the readers queued ahead of the oldest writer.
    fn wake_readers_at_front(&mut self) {
        while self
            .waiters
            .front()
            .is_some_and(|w| w.mode == LockMode::Read)
        {
            if let Some(reader) = self.waiters.pop_front() {
                reader.wake();
            }
        }
    }
}

/// Reentrant read/write lock guarding one resource.
pub struct ResourceLock<R, O, D = WaitForGraph<R, O>> {
    resource: R,
    detector: Arc<D>,
    state: Mutex<LockState<O>>,
}

impl<R, O, D> ResourceLock<R, O, D>
where
    R: Eq + Hash + Clone + Debug,
    O: Eq + Hash + Clone + Debug,
    D: DeadlockDetector<R, O>,
{
    /// Creates an unheld lock for `resource`.
    pub fn new(resource: R, detector: Arc<D>) -> Self {
        Self {
            resource,
            detector,
            state: Mutex::new(LockState {
                read_count: 0,
                write_count: 0,
                pins: 0,
                waiters: VecDeque::new(),
                holders: HashMap::new(),
            }),
        }
    }

    /// Returns the resource this lock guards.
    #[inline]
    pub fn resource(&self) -> &R {
        &self.resource
    }

    /// Acquires a read lock, blocking while another owner holds the write lock.
    pub fn acquire_read(&self, owner: &O) -> Result<(), LockError> {
        self.acquire(owner, LockMode::Read, None)
    }

    /// Acquires the write lock, blocking while any other owner holds a lock.
    pub fn acquire_write(&self, owner: &O) -> Result<(), LockError> {
        self.acquire(owner, LockMode::Write, None)
    }

    /// Acquires a lock in `mode`, giving up after `timeout` if one is given.
    ///
    /// Before each sleep the deadlock detector is consulted; if the wait would
    /// close a cycle this returns `LockError::DeadlockDetected` without
    /// blocking. The eligibility condition is re-checked after every wake.
    pub fn acquire(
        &self,
        owner: &O,
        mode: LockMode,
        timeout: Option<Duration>,
    ) -> Result<(), LockError> {
        let started = Instant::now();
        let deadline = timeout.map(|t| started + t);
        let mut state = self.state.lock();
        let mut signal: Option<Arc<WaitSignal>> = None;

        while state.must_wait(owner, mode) {
            if signal.is_some() && state.write_count == 0 {
                // Woken, but readers got in first. Readers queued behind us
                // were counting on this wake-up; pass it on before requeueing.
                state.wake_readers_at_front();
            }
            self.detector.check_wait_on(owner, &self.resource)?;

            let signal = signal.get_or_insert_with(Arc::default);
            signal.woken.store(false, Ordering::Relaxed);
            state.waiters.push_back(WaitRequest {
                owner: owner.clone(),
                mode,
                signal: Arc::clone(signal),
            });
            debug!(owner = ?owner, resource = ?self.resource, mode = ?mode, "Waiting for lock");

            let timed_out = Self::park(&mut state, signal, deadline);
            self.detector.stop_wait_on(owner, &self.resource);

            if timed_out {
                state.waiters.retain(|w| !Arc::ptr_eq(&w.signal, signal));
                let waited = started.elapsed();
                warn!(owner = ?owner, resource = ?self.resource, waited = ?waited, "Lock wait timed out");
                return Err(LockError::timeout(owner, &self.resource, waited));
            }
        }

        if state.grant(owner, mode) {
            self.detector.lock_acquired(owner, &self.resource);
        }
        if signal.is_some() {
            debug!(owner = ?owner, resource = ?self.resource, mode = ?mode, "Lock granted after wait");
        }
        Ok(())
    }

    /// Sleeps until woken by a release. Returns true if the deadline passed
    /// before a wake-up arrived.
    fn park(
        state: &mut MutexGuard<'_, LockState<O>>,
        signal: &WaitSignal,
        deadline: Option<Instant>,
    ) -> bool {
        while !signal.woken.load(Ordering::Relaxed) {
            match deadline {
                Some(deadline) => {
                    if signal.cond.wait_until(state, deadline).timed_out() {
                        return !signal.woken.load(Ordering::Relaxed);
                    }
                }
                None => signal.cond.wait(state),
            }
        }
        false
    }

    /// Releases one read hold.
    pub fn release_read(&self, owner: &O) -> Result<(), LockError> {
        self.release(owner, LockMode::Read)
    }

    /// Releases one write hold.
    pub fn release_write(&self, owner: &O) -> Result<(), LockError> {
        self.release(owner, LockMode::Write)
    }

    /// Releases one hold of `mode` and wakes the waiters that may now proceed.
    pub fn release(&self, owner: &O, mode: LockMode) -> Result<(), LockError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(counts) = state.holders.get_mut(owner) else {
            return Err(LockError::not_found(owner, &self.resource, mode));
        };
        if counts.get(mode) == 0 {
            return Err(LockError::not_found(owner, &self.resource, mode));
        }

        let total = match mode {
            LockMode::Read => {
                counts.read -= 1;
                &mut state.read_count
            }
            LockMode::Write => {
                counts.write -= 1;
                &mut state.write_count
            }
        };
        *total = total.checked_sub(1).unwrap_or_else(|| {
            panic!(
                "lock on {:?} has per-owner holds but a zero {:?} total",
                self.resource, mode
            )
        });

        if counts.is_empty() {
            if state.pins == 0 {
                state.holders.remove(owner);
            }
            self.detector.lock_released(owner, &self.resource);
        }

        match mode {
            LockMode::Read => state.wake_after_read_release(),
            LockMode::Write if state.write_count == 0 => state.wake_after_write_release(),
            LockMode::Write => {}
        }
        Ok(())
    }

    /// Marks an acquisition in flight so the registry keeps this lock.
    pub(crate) fn pin(&self) {
        self.state.lock().pins += 1;
    }

    /// Drops a pin. Returns true if the lock is now idle and evictable.
    pub(crate) fn unpin(&self) -> bool {
        let mut state = self.state.lock();
        state.pins = state
            .pins
            .checked_sub(1)
            .unwrap_or_else(|| panic!("unbalanced unpin on lock for {:?}", self.resource));
        if state.pins == 0 {
            state.holders.retain(|_, counts| !counts.is_empty());
        }
        state.pins == 0 && state.read_count == 0 && state.write_count == 0
    }

    /// Returns true if nobody holds or pins the lock.
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.pins == 0 && state.read_count == 0 && state.write_count == 0
    }

    /// Returns the total number of read holds.
    pub fn read_count(&self) -> usize {
        self.state.lock().read_count
    }

    /// Returns the total number of write holds.
    pub fn write_count(&self) -> usize {
        self.state.lock().write_count
    }

    /// Returns the number of queued waiters.
    pub fn waiting_count(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Returns the hold counts of `owner`.
    pub fn holds(&self, owner: &O) -> HoldCounts {
        self.state.lock().held_by(owner)
    }

    /// Returns a point-in-time copy of the lock state.
    pub fn snapshot(&self) -> LockSnapshot<O> {
        let state = self.state.lock();
        LockSnapshot {
            read_count: state.read_count,
            write_count: state.write_count,
            pins: state.pins,
            waiters: state
                .waiters
                .iter()
                .map(|w| (w.owner.clone(), w.mode))
                .collect(),
            holders: state
                .holders
                .iter()
                .map(|(owner, counts)| (owner.clone(), *counts))
                .collect(),
        }
    }
}

impl<R: Debug, O, D> Debug for ResourceLock<R, O, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ResourceLock[{:?}]", self.resource)
    }
}
