//! Global rate limiter
//!
//! Caps aggregate in-flight requests with a semaphore and holds every bucket
//! back after a global 429 until the pause has elapsed.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep_until, Instant};

#[derive(Debug)]
pub struct GlobalLimiter {
    permits: Arc<Semaphore>,
    paused_until: Mutex<Option<Instant>>,
}

impl GlobalLimiter {
    pub fn new(concurrency: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(concurrency)),
            paused_until: Mutex::new(None),
        }
    }

    /// Wait out any global pause, then take an in-flight slot
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        loop {
            if let Some(until) = self.paused_until(Instant::now()) {
                sleep_until(until).await;
                continue;
            }

            let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
                // the semaphore is never closed
                std::future::pending::<()>().await;
                continue;
            };

            // a global 429 may have landed while waiting for the permit
            if self.paused_until(Instant::now()).is_none() {
                return permit;
            }
        }
    }

    /// Pause all requests for `wait`
    pub fn pause(&self, wait: Duration) {
        let until = Instant::now() + wait;
        let mut paused = self.paused_until.lock();
        *paused = Some(paused.map_or(until, |current| current.max(until)));
    }

    /// End of the current pause, if one is active
    pub fn paused_until(&self, now: Instant) -> Option<Instant> {
        let mut paused = self.paused_until.lock();
        match *paused {
            Some(until) if until > now => Some(until),
            Some(_) => {
                *paused = None;
                None
            }
            None => None,
        }
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
