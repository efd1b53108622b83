//! Injectable time source.
//!
//! Cache expiry reads the time through [`Clock`] so tests can move it by hand
//! with [`ManualClock`].

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::time::Duration;

use crate::platform::PlatformSendSync;

/// Source of "now" for anything with an expiry.
///
/// ```
/// use bridge_traits::time::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::default();
/// let stored = clock.now();
/// clock.advance(Duration::from_secs(600));
/// assert_eq!((clock.now() - stored).num_seconds(), 600);
/// ```
pub trait Clock: PlatformSendSync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let millis = i64::try_from(delta.as_millis()).unwrap_or(i64::MAX);
        let mut now = self.now.lock();
        *now += chrono::Duration::milliseconds(millis);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_tracks_wall_time() {
        let before = Utc::now();
        let now = SystemClock.now();
        assert!(now >= before);
    }

    #[test]
    fn test_manual_clock_advances_only_on_demand() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::from_secs(90));
        assert_eq!(clock.now() - start, chrono::Duration::seconds(90));
        assert_eq!(clock.now(), clock.now());
    }
}
