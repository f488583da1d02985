// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Detector that accepts every wait.

use crate::lock::LockError;

use super::DeadlockDetector;

/// A detector that never reports a deadlock.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDetection;

impl<R, O> DeadlockDetector<R, O> for NoDetection {
    #[inline]
    fn check_wait_on(&self, _owner: &O, _resource: &R) -> Result<(), LockError> {
        Ok(())
    }

    #[inline]
    fn stop_wait_on(&self, _owner: &O, _resource: &R) {}

    #[inline]
    fn lock_acquired(&self, _owner: &O, _resource: &R) {}

    #[inline]
    fn lock_released(&self, _owner: &O, _resource: &R) {}
}
