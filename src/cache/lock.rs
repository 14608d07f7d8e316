//! Per-release rebuild locks
//!
//! At most one rebuild runs per release at a time. Waiters block until the
//! holder finishes and then see whatever the holder produced.

use crate::error::{StrataError, StrataResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Registry of async mutexes keyed by release id
#[derive(Debug, Default, Clone)]
pub struct RebuildLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl RebuildLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    /// Wait for the lock of `key`; the lock is released when the guard drops
    pub async fn acquire(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> StrataResult<OwnedMutexGuard<()>> {
        let lock = self.lock_for(key);
        if let Ok(guard) = Arc::clone(&lock).try_lock_owned() {
            return Ok(guard);
        }

        debug!("Waiting for running rebuild of {}", key);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StrataError::Cancelled),
            guard = lock.lock_owned() => Ok(guard),
        }
    }

    /// Whether a rebuild of `key` currently holds its lock
    pub fn is_held(&self, key: &str) -> bool {
        let locks = self.locks.lock();
        locks
            .get(key)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }
}
