//! Simulated time.
//!
//! The kernel never looks at the wall clock. [`SimTime`] is an instant on the
//! simulation timeline measured from the start of the current trial, and all
//! spans are plain [`Duration`]s.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::time::Duration;

use crate::error::{KernelError, SimResult};

/// Instant on the simulated timeline, relative to trial start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimTime(pub Duration);

impl SimTime {
    pub const ZERO: Self = Self(Duration::ZERO);

    /// Sentinel used for "never" (e.g. the expiry of a permanent aura).
    pub const NEVER: Self = Self(Duration::MAX);

    pub const fn from_duration(offset: Duration) -> Self {
        Self(offset)
    }

    /// Fails on negative, NaN or overflowing input.
    pub fn from_secs_f64(secs: f64) -> SimResult<Self> {
        Duration::try_from_secs_f64(secs)
            .map(Self)
            .map_err(|_| KernelError::InvalidTime(secs))
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    pub const fn as_duration(self) -> Duration {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0.as_secs_f64()
    }

    pub fn is_never(self) -> bool {
        self == Self::NEVER
    }

    /// Time remaining until `later`, saturating at zero.
    pub fn until(self, later: SimTime) -> Duration {
        later.0.saturating_sub(self.0)
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    /// Saturates at [`SimTime::NEVER`].
    fn add(self, rhs: Duration) -> SimTime {
        SimTime(self.0.saturating_add(rhs))
    }
}

impl AddAssign<Duration> for SimTime {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl Sub<SimTime> for SimTime {
    type Output = Duration;

    fn sub(self, rhs: SimTime) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_never() {
            write!(f, "never")
        } else {
            write!(f, "{:.3}s", self.0.as_secs_f64())
        }
    }
}

/// How long an aura stays active after activation or refresh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AuraDuration {
    /// Expires this long after activation. A zero duration expires at the
    /// activation timestamp, after the activating event finishes.
    Finite(Duration),

    /// Never expires on its own; only explicit deactivation or the end of a
    /// trial removes it.
    Never,
}

impl AuraDuration {
    pub const fn secs(secs: u64) -> Self {
        Self::Finite(Duration::from_secs(secs))
    }

    pub const fn millis(millis: u64) -> Self {
        Self::Finite(Duration::from_millis(millis))
    }

    /// Expiry instant for an activation at `now`.
    pub fn expires_from(self, now: SimTime) -> SimTime {
        match self {
            Self::Finite(span) => now + span,
            Self::Never => SimTime::NEVER,
        }
    }

    pub fn is_never(self) -> bool {
        matches!(self, Self::Never)
    }
}

impl Default for AuraDuration {
    fn default() -> Self {
        Self::Never
    }
}

impl From<Duration> for AuraDuration {
    fn from(span: Duration) -> Self {
        Self::Finite(span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adding_to_never_saturates() {
        assert_eq!(SimTime::NEVER + Duration::from_secs(5), SimTime::NEVER);
    }

    #[test]
    fn until_saturates_at_zero() {
        let early = SimTime::from_millis(500);
        let late = SimTime::from_millis(2_000);
        assert_eq!(early.until(late), Duration::from_millis(1_500));
        assert_eq!(late.until(early), Duration::ZERO);
    }

    #[test]
    fn float_seconds_reject_negative_and_nan() {
        assert_eq!(SimTime::from_secs_f64(1.5), Ok(SimTime::from_millis(1_500)));
        assert_eq!(SimTime::from_secs_f64(-1.0), Err(KernelError::InvalidTime(-1.0)));
        assert!(matches!(
            SimTime::from_secs_f64(f64::NAN),
            Err(KernelError::InvalidTime(secs)) if secs.is_nan()
        ));
        assert!(SimTime::from_secs_f64(f64::INFINITY).is_err());
    }

    #[test]
    fn permanent_duration_never_expires() {
        assert!(AuraDuration::Never.expires_from(SimTime::ZERO).is_never());
        assert_eq!(
            AuraDuration::secs(12).expires_from(SimTime::from_millis(3_000)),
            SimTime::from_millis(15_000)
        );
    }
}
