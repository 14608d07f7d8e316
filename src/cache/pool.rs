//! Shared worker pool bounding outstanding transport calls.
//!
//! One pool is built at startup and cloned into every crawler and gap
//! loader, so concurrent rebuilds of different releases share the same
//! width. Work units hold a permit only for their own I/O and never while
//! waiting on other units, so the pool cannot starve itself.

use crate::error::{StrataError, StrataResult};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Default number of concurrent transport calls
pub const DEFAULT_POOL_WIDTH: usize = 5;

/// Fixed-width permit pool
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    /// Create a pool allowing `width` concurrent work units (at least one)
    pub fn new(width: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(width.max(1))),
        }
    }

    /// Wait for a free slot; the slot is returned when the permit drops
    pub async fn acquire(&self) -> StrataResult<OwnedSemaphorePermit> {
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| StrataError::Internal("worker pool closed".to_string()))
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_WIDTH)
    }
}
