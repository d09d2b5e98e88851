//! Wall clock abstraction: owns "now" for every operation.
//!
//! RULE: Nothing in the core calls `Utc::now()` directly.
//! Services and the sweeper read time through a `Clock` so tests can
//! move time forward across the 48-hour SLA without sleeping.

use crate::types::Timestamp;
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Production clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    pub fn set(&self, at: Timestamp) {
        self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
    }

    /// Advance by `by`. Returns the new instant.
    pub fn advance(&self, by: Duration) -> Timestamp {
        let step = by.num_milliseconds();
        let now = self.millis.fetch_add(step, Ordering::SeqCst) + step;
        crate::types::from_millis(now)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        crate::types::from_millis(self.millis.load(Ordering::SeqCst))
    }
}
