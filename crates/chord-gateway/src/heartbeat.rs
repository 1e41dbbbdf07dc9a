//! Heartbeat timer
//!
//! One task per connection. It does not write to the transport itself: on
//! every tick it asks the session to beat, or reports the connection zombied
//! when the previous beat was never acknowledged.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatSignal {
    /// Send a heartbeat now
    Beat,
    /// The last beat was not acknowledged before the next one was due
    Zombied,
}

/// Share of the interval the first beat may be pulled forward by
const FIRST_BEAT_JITTER: f64 = 0.05;

/// Largest amount the first beat can come early
pub fn max_first_beat_jitter(interval: Duration) -> Duration {
    interval.mul_f64(FIRST_BEAT_JITTER)
}

/// Delay before the first beat
///
/// Slightly under `interval`, by an amount derived from the shard id so
/// reconnecting shards do not beat in lockstep. Later beats follow every
/// `interval`.
pub fn first_beat_delay(interval: Duration, shard_id: u32) -> Duration {
    let mixed = (u64::from(shard_id) + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let fraction = (mixed >> 11) as f64 / (1u64 << 53) as f64;
    interval.saturating_sub(max_first_beat_jitter(interval).mul_f64(fraction))
}

#[derive(Debug)]
pub struct HeartbeatTimer {
    awaiting_ack: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl HeartbeatTimer {
    /// Start ticking: first after `first_delay`, then every `interval`
    pub fn start(
        interval: Duration,
        first_delay: Duration,
        signals: mpsc::Sender<HeartbeatSignal>,
    ) -> Self {
        let awaiting_ack = Arc::new(AtomicBool::new(false));
        let pending = Arc::clone(&awaiting_ack);

        let task = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + first_delay, interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticks.tick().await;
                let signal = if pending.load(Ordering::Acquire) {
                    HeartbeatSignal::Zombied
                } else {
                    HeartbeatSignal::Beat
                };
                if signals.send(signal).await.is_err() || signal == HeartbeatSignal::Zombied {
                    break;
                }
            }
        });

        Self { awaiting_ack, task }
    }

    /// A heartbeat went out
    pub fn sent(&self) {
        self.awaiting_ack.store(true, Ordering::Release);
    }

    /// The server acknowledged
    pub fn acked(&self) {
        self.awaiting_ack.store(false, Ordering::Release);
    }

    pub fn is_awaiting_ack(&self) -> bool {
        self.awaiting_ack.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for HeartbeatTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
