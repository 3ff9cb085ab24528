use std::fmt::Debug;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync + Debug + 'static {
    /// Current UTC instant
    fn now(&self) -> DateTime<Utc>;

    /// Seconds since UNIX epoch
    fn unix_seconds(&self) -> i64 {
        self.now().timestamp()
    }
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same underlying instant, so a test can hand one clone to
/// the component under test and advance time through another.
#[derive(Debug, Clone)]
pub struct MockClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a mock clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(start)) }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock();
        *now += duration;
    }

    /// Jump to an absolute instant
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock() = instant;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn mock_clock_is_frozen_until_advanced() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = MockClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), start + Duration::minutes(5));
    }

    #[test]
    fn clones_share_time() {
        let clock = MockClock::default();
        let observer = clock.clone();
        let target = Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap();

        clock.set(target);
        assert_eq!(observer.now(), target);
        assert_eq!(observer.unix_seconds(), target.timestamp());
    }

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
