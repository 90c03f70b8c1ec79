use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Wall-clock instant in milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TimestampMs(pub i64);

impl TimestampMs {
    pub fn millis_since(self, earlier: TimestampMs) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    pub fn plus_millis(self, millis: i64) -> TimestampMs {
        TimestampMs(self.0.saturating_add(millis))
    }
}

pub trait Clock: Send {
    fn now_ms(&self) -> TimestampMs;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> TimestampMs {
        TimestampMs(chrono::Utc::now().timestamp_millis())
    }
}

/// Clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn starting_at(start: TimestampMs) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start.0)),
        }
    }

    pub fn set(&self, at: TimestampMs) {
        self.now.store(at.0, Ordering::Relaxed);
    }

    pub fn advance_ms(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> TimestampMs {
        TimestampMs(self.now.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::starting_at(TimestampMs(1_000));
        let observer = clock.clone();
        clock.advance_ms(250);
        assert_eq!(observer.now_ms(), TimestampMs(1_250));

        observer.set(TimestampMs(5));
        assert_eq!(clock.now_ms(), TimestampMs(5));
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_ms().0 > 1_577_836_800_000);
    }

    #[test]
    fn millis_since_saturates() {
        assert_eq!(TimestampMs(10).millis_since(TimestampMs(4)), 6);
        assert_eq!(TimestampMs(i64::MIN).millis_since(TimestampMs(1)), i64::MIN);
        assert_eq!(TimestampMs(3).plus_millis(7), TimestampMs(10));
    }
}
