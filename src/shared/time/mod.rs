//! Time sources for expiry bookkeeping.

use parking_lot::Mutex;
use std::time::{Duration, SystemTime};

/// Source of "now" for the cache.
/// Production code uses [`SystemClock`]; tests drive a [`ManualClock`].
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    /// Creates a clock frozen at the current wall time.
    pub fn new() -> Self {
        Self::starting_at(SystemTime::now())
    }

    /// Creates a clock frozen at `at`.
    pub fn starting_at(at: SystemTime) -> Self {
        Self { now: Mutex::new(at) }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock()
    }
}

/// Returns the duration elapsed between `earlier` and `clock.now()`, saturating at zero.
pub fn since(clock: &dyn Clock, earlier: SystemTime) -> Duration {
    clock.now().duration_since(earlier).unwrap_or(Duration::ZERO)
}
