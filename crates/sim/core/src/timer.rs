//! Readiness gates bound to the simulated clock.
//!
//! A [`Timer`] only answers "ready at or after T". Everything that decides
//! whether an action may happen (stealth, resources, ...) lives in the caller.

use std::fmt;
use std::time::Duration;

use crate::time::SimTime;

/// Handle to a timer owned by the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u32);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Next-ready timestamp. Moves forward only, except on [`Timer::reset`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timer {
    ready_at: SimTime,
}

impl Timer {
    pub const fn new() -> Self {
        Self {
            ready_at: SimTime::ZERO,
        }
    }

    pub fn ready_at(&self) -> SimTime {
        self.ready_at
    }

    pub fn is_ready(&self, now: SimTime) -> bool {
        now >= self.ready_at
    }

    pub fn time_to_ready(&self, now: SimTime) -> Duration {
        now.until(self.ready_at)
    }

    /// Push readiness out to `ready_at`. Earlier values are ignored.
    pub fn set(&mut self, ready_at: SimTime) {
        if ready_at > self.ready_at {
            self.ready_at = ready_at;
        }
    }

    /// Make the timer ready immediately.
    pub fn reset(&mut self) {
        self.ready_at = SimTime::ZERO;
    }
}

/// A timer paired with the duration one use costs.
///
/// Several cooldowns may share the same [`TimerId`] (shared cooldown groups).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cooldown {
    pub timer: TimerId,
    pub duration: Duration,
}

impl Cooldown {
    pub const fn new(timer: TimerId, duration: Duration) -> Self {
        Self { timer, duration }
    }
}
