//! Identify concurrency
//!
//! The platform allows `max_concurrency` identifies per spacing window, one
//! per rate-limit key where `key = shard_id % max_concurrency`. Each key is a
//! single permit held for `spacing` after acquisition, whether or not the
//! identify was sent in the meantime.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

#[derive(Debug)]
pub struct IdentifyLimiter {
    slots: Vec<Arc<Semaphore>>,
    spacing: Duration,
}

impl IdentifyLimiter {
    pub fn new(max_concurrency: u32, spacing: Duration) -> Self {
        let slots = (0..max_concurrency.max(1))
            .map(|_| Arc::new(Semaphore::new(1)))
            .collect();
        Self { slots, spacing }
    }

    pub fn max_concurrency(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Rate-limit key of a shard
    pub fn slot_of(&self, shard_id: u32) -> usize {
        shard_id as usize % self.slots.len()
    }

    /// Wait for the shard's slot; it frees itself `spacing` later
    pub async fn acquire(&self, shard_id: u32) {
        let slot = self.slot_of(shard_id);
        let Ok(permit) = Arc::clone(&self.slots[slot]).acquire_owned().await else {
            // slots are never closed
            return;
        };
        tracing::debug!(shard_id, slot, "Identify slot acquired");

        let spacing = self.spacing;
        tokio::spawn(async move {
            tokio::time::sleep(spacing).await;
            drop(permit);
        });
    }

    /// Slots currently held
    pub fn in_use(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.available_permits() == 0)
            .count()
    }
}
