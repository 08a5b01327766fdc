//! Counting admission gates
//!
//! The dispatcher owns two independent gates: one bounding fetch attempts
//! in flight, and an optional one bounding how many worker tasks are alive.
//! They never share permits.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A counting gate with a fixed capacity
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Waits for a free slot
    ///
    /// The slot is released when the returned permit is dropped. Returns
    /// `None` only if the gate has been closed.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        self.semaphore.clone().acquire_owned().await.ok()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently free
    #[cfg(test)]
    fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
