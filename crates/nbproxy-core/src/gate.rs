//! Caps the number of upstream calls in flight.
//!
//! Backed by a tokio semaphore, which hands out permits to waiters in FIFO
//! order. The gate is owned by the service and cloned into whoever needs it.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
#[error("concurrency gate closed")]
pub struct GateClosed;

#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    max: usize,
}

/// One concurrency slot. The slot is released when the permit is dropped.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn active(&self) -> usize {
        self.max - self.semaphore.available_permits()
    }

    /// Waits for a free slot. Waiters are admitted in arrival order.
    pub async fn acquire(&self) -> Result<GatePermit, GateClosed> {
        if self.semaphore.available_permits() == 0 {
            debug!(event = "gate_wait", active = self.active(), max = self.max);
        }
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| GateClosed)?;
        Ok(GatePermit { _permit: permit })
    }

    pub fn try_acquire(&self) -> Option<GatePermit> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| GatePermit { _permit: permit })
    }
}
