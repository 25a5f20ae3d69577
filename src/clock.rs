//! Time source for the ledger.
//!
//! Withdrawal windows depend on wall-clock days, so the engine never reads
//! the system time directly. Tests and the simulator drive a [`ManualClock`].

use crate::types::Timestamp;
use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};

pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            millis: AtomicI64::new(start.as_millis()),
        }
    }

    pub fn set(&self, timestamp: Timestamp) {
        self.millis.store(timestamp.as_millis(), Ordering::SeqCst);
    }

    pub fn advance_millis(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn advance_days(&self, days: i64) {
        self.advance_millis(days * crate::types::MILLIS_PER_DAY);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_when_told() {
        let clock = ManualClock::new(Timestamp::from_millis(1_000));
        assert_eq!(clock.now().as_millis(), 1_000);

        clock.advance_millis(500);
        assert_eq!(clock.now().as_millis(), 1_500);

        clock.advance_days(2);
        assert_eq!(clock.now().as_millis(), 1_500 + 2 * crate::types::MILLIS_PER_DAY);

        clock.set(Timestamp::from_millis(0));
        assert_eq!(clock.now().as_millis(), 0);
    }
}
