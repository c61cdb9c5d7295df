use std::sync::Mutex;

use chrono::{Duration, NaiveDateTime, Utc};

/// Source of snapshot timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock in UTC. Local time repeats an hour when DST ends, which would let
/// a newer snapshot sort before an older one.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc()
    }
}

/// Returns `start`, then advances by `step` on every call.
#[derive(Debug)]
pub struct SteppingClock {
    next: Mutex<NaiveDateTime>,
    step: Duration,
}

impl SteppingClock {
    pub fn new(start: NaiveDateTime, step: Duration) -> Self {
        Self {
            next: Mutex::new(start),
            step,
        }
    }

    /// A clock that never advances; every snapshot lands in the same second.
    pub fn frozen(at: NaiveDateTime) -> Self {
        Self::new(at, Duration::zero())
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> NaiveDateTime {
        let mut next = match self.next.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let current = *next;
        *next = current + self.step;
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn system_clock_reads_utc() {
        let before = Utc::now().naive_utc();
        let now = SystemClock.now();
        let after = Utc::now().naive_utc();
        assert!(before <= now && now <= after);
    }

    #[test]
    fn stepping_clock_advances_per_call() {
        let start = NaiveDate::from_ymd_opt(2025, 7, 18)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        let clock = SteppingClock::new(start, Duration::seconds(5));
        assert_eq!(clock.now(), start);
        assert_eq!(clock.now(), start + Duration::seconds(5));
        assert_eq!(clock.now(), start + Duration::seconds(10));
    }
}
