use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;

/// Seconds between the Unix epoch and the charger epoch (2000-01-01 00:00:00 UTC).
const CHARGER_EPOCH_UNIX: i64 = 946_684_800;

/// Source of time for the ChargePoint actor.
///
/// Retransmission and configuration pacing are driven by `now()`; the
/// timestamp fields in metering replies are driven by `epoch_seconds()`.
/// Injecting the clock keeps both fully deterministic under test.
pub trait Clock: Send + Sync {
    /// Monotonic reading for elapsed-time decisions.
    fn now(&self) -> Instant;

    /// Wall-clock seconds since the charger epoch (2000-01-01 00:00:00 UTC).
    fn epoch_seconds(&self) -> u64;
}

/// The real thing: `Instant::now()` plus the system wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_seconds(&self) -> u64 {
        Utc::now().timestamp().saturating_sub(CHARGER_EPOCH_UNIX).max(0) as u64
    }
}

/// A virtual clock that only moves when told to.
pub struct ManualClock {
    start: Instant,
    offset_ms: AtomicU64,
    epoch: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset_ms: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
        }
    }

    /// Move the monotonic reading forward.
    pub fn advance(&self, by: Duration) {
        self.offset_ms.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    /// Pin the wall-clock reading (seconds since the charger epoch).
    pub fn set_epoch_seconds(&self, secs: u64) {
        self.epoch.store(secs, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }

    fn epoch_seconds(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        clock.advance(Duration::from_millis(2500));
        assert_eq!(clock.now().duration_since(t0), Duration::from_millis(2500));
    }

    #[test]
    fn test_manual_clock_epoch() {
        let clock = ManualClock::new();
        assert_eq!(clock.epoch_seconds(), 0);
        clock.set_epoch_seconds(0x1234_5678);
        assert_eq!(clock.epoch_seconds(), 0x1234_5678);
    }
}
