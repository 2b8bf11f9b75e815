//! Bounded-permit gate for concurrent part uploads
//!
//! Permits are handed out in FIFO order: the longest-waiting caller is
//! granted first. A permit is released when its guard drops, so every exit
//! path of the guarded work (success, error, task abort) gives it back
//! exactly once.

use crate::{ClientError, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, SemaphorePermit};

/// FIFO concurrency limiter
#[derive(Clone, Debug)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// Permit borrowed from a limiter; released on drop
#[derive(Debug)]
pub struct LimiterPermit<'a> {
    _permit: SemaphorePermit<'a>,
}

/// Permit that can be moved into a spawned task; released on drop
#[derive(Debug)]
pub struct OwnedLimiterPermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyLimiter {
    /// Create a limiter with a fixed number of permits
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ClientError::Config(
                "concurrency limit must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Wait for a permit
    pub async fn acquire(&self) -> LimiterPermit<'_> {
        // The semaphore is never closed, so acquire cannot fail.
        let permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => unreachable!("limiter semaphore closed"),
        };
        LimiterPermit { _permit: permit }
    }

    /// Wait for a permit that is not tied to the limiter's lifetime
    pub async fn acquire_owned(&self) -> OwnedLimiterPermit {
        let permit = match Arc::clone(&self.semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => unreachable!("limiter semaphore closed"),
        };
        OwnedLimiterPermit { _permit: permit }
    }

    /// Run a future while holding a permit
    pub async fn run<F, T>(&self, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let _permit = self.acquire().await;
        fut.await
    }

    /// Configured number of permits
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Permits currently held
    pub fn in_flight(&self) -> usize {
        self.capacity - self.available()
    }
}
