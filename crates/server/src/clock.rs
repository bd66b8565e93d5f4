//! Clock sources for the coordinator service.
//!
//! Every phase decision in the coordinator uses a timestamp taken from
//! one of these sources at the RPC boundary, so there is exactly one
//! authoritative answer to "what time is it" per call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the authoritative Unix timestamp.
pub trait Clock: Send + Sync {
    fn now_unix(&self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Manually driven clock for testing time-dependent logic.
#[derive(Debug)]
pub struct ManualClock {
    current: AtomicU64,
}

impl ManualClock {
    pub fn new(initial: u64) -> Self {
        Self {
            current: AtomicU64::new(initial),
        }
    }

    pub fn set(&self, timestamp: u64) {
        self.current.store(timestamp, Ordering::SeqCst);
    }

    /// Advance by `seconds` and return the new time.
    pub fn advance(&self, seconds: u64) -> u64 {
        self.current.fetch_add(seconds, Ordering::SeqCst) + seconds
    }
}

impl Clock for ManualClock {
    fn now_unix(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_returns_reasonable_value() {
        let now = SystemClock.now_unix();
        // After 2020, before 2100.
        assert!(now > 1_577_836_800);
        assert!(now < 4_102_444_800);
    }

    #[test]
    fn manual_clock_set_and_advance() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_unix(), 1_000);

        clock.set(2_000);
        assert_eq!(clock.now_unix(), 2_000);

        assert_eq!(clock.advance(500), 2_500);
        assert_eq!(clock.now_unix(), 2_500);
    }
}
