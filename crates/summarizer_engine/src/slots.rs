use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounded pool of job slots capping simultaneous fetch+summarize pipelines.
///
/// This protects local resources (connections, memory) that the rate
/// governor does not model. Slots are released when the returned guard
/// drops.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    permits: Arc<Semaphore>,
    capacity: usize,
}

/// RAII guard for one acquired job slot.
#[derive(Debug)]
pub struct JobSlot {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyLimiter {
    pub fn new(capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity.max(1))),
            capacity: capacity.max(1),
        }
    }

    /// Suspends the caller until a slot is free.
    pub async fn acquire(&self) -> JobSlot {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .expect("job slot semaphore closed");
        JobSlot { _permit: permit }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Currently free slots; used by tests to check permit accounting.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
