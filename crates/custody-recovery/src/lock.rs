//! Recovery-wide mutual exclusion
//!
//! One [`RecoveryLock`] is shared by the orchestrator and the synchronizer so a
//! status poll can never interleave with a rotation or completion step.

use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Async mutex guarding writes to the recovery records.
#[derive(Debug, Clone, Default)]
pub struct RecoveryLock {
    inner: Arc<Mutex<()>>,
}

/// Held while a recovery mutation or sync cycle runs.
#[derive(Debug)]
pub struct RecoveryLockGuard {
    _guard: OwnedMutexGuard<()>,
}

impl RecoveryLock {
    /// Create an unlocked lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the lock.
    pub async fn acquire(&self) -> RecoveryLockGuard {
        RecoveryLockGuard {
            _guard: self.inner.clone().lock_owned().await,
        }
    }

    /// Take the lock if it is free.
    pub fn try_acquire(&self) -> Option<RecoveryLockGuard> {
        self.inner
            .clone()
            .try_lock_owned()
            .ok()
            .map(|guard| RecoveryLockGuard { _guard: guard })
    }

    /// Whether someone currently holds the lock.
    pub fn is_held(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}
