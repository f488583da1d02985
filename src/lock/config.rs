// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Configuration for the lock registry.

use std::time::Duration;

/// Configuration for [`LockRegistry`](super::LockRegistry) initialization.
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Give up on a blocked acquisition after this long (None = wait until
    /// granted or a deadlock is detected).
    pub acquire_timeout: Option<Duration>,
    /// Initial capacity of the resource map.
    pub initial_capacity: usize,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            acquire_timeout: None,
            initial_capacity: 64,
        }
    }
}

impl LockConfig {
    /// Creates a configuration that waits indefinitely.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the acquire timeout.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Sets the initial capacity of the resource map.
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }
}
