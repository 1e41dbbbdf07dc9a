//! Logical write versions
//!
//! Every cache write carries a version drawn from one monotonic clock. Gateway
//! frames take theirs on receipt and REST requests at submission, so a response
//! to an older request never overwrites a newer dispatch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Logical timestamp of a cache write
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// Lowest version; anything stamped by a clock is newer
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Monotonic source of versions, shared by all writers
#[derive(Debug, Default)]
pub struct VersionClock {
    last: AtomicU64,
}

impl VersionClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp a new write; strictly greater than every earlier stamp
    pub fn tick(&self) -> Version {
        Version(self.last.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// The most recent stamp handed out
    #[must_use]
    pub fn current(&self) -> Version {
        Version(self.last.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_tick_is_monotonic() {
        let clock = VersionClock::new();
        let a = clock.tick();
        let b = clock.tick();
        assert!(a < b);
        assert_eq!(clock.current(), b);
        assert!(Version::ZERO < a);
    }

    #[test]
    fn test_concurrent_ticks_are_unique() {
        let clock = Arc::new(VersionClock::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let clock = Arc::clone(&clock);
                std::thread::spawn(move || (0..1000).map(|_| clock.tick().get()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 4000);
    }
}
