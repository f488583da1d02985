// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Wait-for graph deadlock detector.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::lock::LockError;

use super::DeadlockDetector;

/// Holders per resource and the resource each blocked owner waits on.
///
/// Wait edges are derived: a blocked owner has an edge to every current
/// holder of the resource it waits on, so the edges always track holder
/// changes without extra bookkeeping.
struct GraphState<R, O> {
    holders: HashMap<R, HashSet<O>>,
    waiting: HashMap<O, R>,
}

impl<R, O> GraphState<R, O>
where
    R: Eq + Hash,
    O: Eq + Hash,
{
    /// Returns true if `owner` waiting on `resource` would close a cycle.
    fn closes_cycle(&self, owner: &O, resource: &R) -> bool {
        let mut visited: HashSet<&O> = HashSet::new();
        let mut stack: Vec<&O> = Vec::new();
        self.push_blockers(owner, resource, &mut stack);

        while let Some(current) = stack.pop() {
            if current == owner {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(next) = self.waiting.get(current) {
                self.push_blockers(current, next, &mut stack);
            }
        }
        false
    }

    /// Pushes every holder of `resource` other than `waiter` itself. An
    /// owner's own hold never blocks it (reentrancy and upgrade).
    fn push_blockers<'a>(&'a self, waiter: &O, resource: &R, stack: &mut Vec<&'a O>) {
        if let Some(holders) = self.holders.get(resource) {
            stack.extend(holders.iter().filter(|h| *h != waiter));
        }
    }
}

/// Deadlock detector keeping a wait-for graph between owners.
///
/// A single mutex guards the graph, so registering a wait and searching for a
/// cycle is one atomic step: of two owners closing a cycle concurrently,
/// exactly one is refused.
pub struct WaitForGraph<R, O> {
    state: Mutex<GraphState<R, O>>,
}

impl<R, O> WaitForGraph<R, O>
where
    R: Eq + Hash + Clone,
    O: Eq + Hash + Clone,
{
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GraphState {
                holders: HashMap::new(),
                waiting: HashMap::new(),
            }),
        }
    }

    /// Returns the resource `owner` is currently waiting on.
    pub fn waiting_on(&self, owner: &O) -> Option<R> {
        self.state.lock().waiting.get(owner).cloned()
    }

    /// Returns the owners currently holding `resource`.
    pub fn holders_of(&self, resource: &R) -> Vec<O> {
        self.state
            .lock()
            .holders
            .get(resource)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the number of owners currently blocked.
    pub fn blocked_count(&self) -> usize {
        self.state.lock().waiting.len()
    }
}

impl<R, O> Default for WaitForGraph<R, O>
where
    R: Eq + Hash + Clone,
    O: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R, O> DeadlockDetector<R, O> for WaitForGraph<R, O>
where
    R: Eq + Hash + Clone + Debug + Send + Sync,
    O: Eq + Hash + Clone + Debug + Send + Sync,
{
    fn check_wait_on(&self, owner: &O, resource: &R) -> Result<(), LockError> {
        let mut state = self.state.lock();

        if state.closes_cycle(owner, resource) {
            warn!(owner = ?owner, resource = ?resource, "Deadlock detected");
            return Err(LockError::deadlock(owner, resource));
        }

        state.waiting.insert(owner.clone(), resource.clone());
        trace!(owner = ?owner, resource = ?resource, "Registered wait");
        Ok(())
    }

    fn stop_wait_on(&self, owner: &O, resource: &R) {
        let mut state = self.state.lock();
        if state.waiting.get(owner) == Some(resource) {
            state.waiting.remove(owner);
        }
    }

    fn lock_acquired(&self, owner: &O, resource: &R) {
        self.state
            .lock()
            .holders
            .entry(resource.clone())
            .or_default()
            .insert(owner.clone());
    }

    fn lock_released(&self, owner: &O, resource: &R) {
        let mut state = self.state.lock();
        if let Some(set) = state.holders.get_mut(resource) {
            set.remove(owner);
            if set.is_empty() {
                state.holders.remove(resource);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> WaitForGraph<&'static str, u32> {
        WaitForGraph::new()
    }

    #[test]
    fn test_wait_on_free_resource() {
        let g = graph();
        g.check_wait_on(&1, &"r1").unwrap();
        assert_eq!(g.waiting_on(&1), Some("r1"));
        assert_eq!(g.blocked_count(), 1);

        g.stop_wait_on(&1, &"r1");
        assert_eq!(g.waiting_on(&1), None);
        assert_eq!(g.blocked_count(), 0);
    }

    #[test]
    fn test_two_owner_cycle() {
        let g = graph();
        g.lock_acquired(&1, &"r1");
        g.lock_acquired(&2, &"r2");

        // 1 waits on r2 (held by 2)
        g.check_wait_on(&1, &"r2").unwrap();

        // 2 waiting on r1 (held by 1) closes the cycle
        let err = g.check_wait_on(&2, &"r1").unwrap_err();
        assert!(err.is_deadlock());
        assert_eq!(g.waiting_on(&2), None);
        assert_eq!(g.waiting_on(&1), Some("r2"));
    }

    #[test]
    fn test_three_owner_cycle() {
        let g = graph();
        g.lock_acquired(&1, &"a");
        g.lock_acquired(&2, &"b");
        g.lock_acquired(&3, &"c");

        g.check_wait_on(&1, &"b").unwrap();
        g.check_wait_on(&2, &"c").unwrap();
        assert!(g.check_wait_on(&3, &"a").is_err());

        // Once 1 stops waiting the chain is broken
        g.stop_wait_on(&1, &"b");
        g.check_wait_on(&3, &"a").unwrap();
    }

    #[test]
    fn test_upgrade_is_not_a_cycle() {
        let g = graph();
        g.lock_acquired(&1, &"r");
        g.lock_acquired(&2, &"r");

        // 1 wants to upgrade while 2 still reads: waits on 2, not on itself
        g.check_wait_on(&1, &"r").unwrap();

        // 2 upgrading as well waits on 1, which waits on 2
        assert!(g.check_wait_on(&2, &"r").is_err());
    }

    #[test]
    fn test_release_removes_holder() {
        let g = graph();
        g.lock_acquired(&1, &"r1");
        g.lock_acquired(&2, &"r2");
        g.check_wait_on(&1, &"r2").unwrap();

        g.lock_released(&1, &"r1");
        assert!(g.holders_of(&"r1").is_empty());

        // 1 no longer holds r1, so 2 can wait on it
        g.check_wait_on(&2, &"r1").unwrap();
    }

    #[test]
    fn test_stop_wait_on_other_resource_is_noop() {
        let g = graph();
        g.check_wait_on(&1, &"r1").unwrap();
        g.stop_wait_on(&1, &"r2");
        assert_eq!(g.waiting_on(&1), Some("r1"));
    }
}
