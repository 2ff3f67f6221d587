//! Microsecond-precision time type shared by all parsers.
//!
//! `TimeDelta` represents both points on a stream's presentation timeline and
//! durations between them. It is a plain signed microsecond count: container
//! timecodes are scaled into it at parse time, so downstream code never deals
//! with per-container timescales.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// A signed time quantity with microsecond precision.
///
/// Unknown durations are represented as `Option<TimeDelta>` at use sites;
/// `TimeDelta::MAX` stands in for an unbounded ("infinite") value where an
/// upper bound is required.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TimeDelta(i64);

impl TimeDelta {
    /// Zero-length delta.
    pub const ZERO: TimeDelta = TimeDelta(0);

    /// The largest representable delta, used as an "infinite" bound.
    pub const MAX: TimeDelta = TimeDelta(i64::MAX);

    /// Create a delta from whole microseconds.
    pub const fn from_micros(micros: i64) -> Self {
        TimeDelta(micros)
    }

    /// Create a delta from whole milliseconds.
    pub const fn from_millis(millis: i64) -> Self {
        TimeDelta(millis * 1_000)
    }

    /// Create a delta from whole seconds.
    pub const fn from_seconds(seconds: i64) -> Self {
        TimeDelta(seconds * 1_000_000)
    }

    /// Create a delta from nanoseconds, truncating toward zero.
    pub const fn from_nanos(nanos: i64) -> Self {
        TimeDelta(nanos / 1_000)
    }

    /// The delta as whole microseconds.
    pub const fn as_micros(self) -> i64 {
        self.0
    }

    /// The delta as fractional milliseconds.
    pub fn as_millis_f64(self) -> f64 {
        self.0 as f64 / 1_000.0
    }

    /// Whether the delta is strictly negative.
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Whether the delta is exactly zero.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// The smaller of two deltas.
    pub fn min(self, other: TimeDelta) -> TimeDelta {
        if self <= other {
            self
        } else {
            other
        }
    }

    /// The larger of two deltas.
    pub fn max(self, other: TimeDelta) -> TimeDelta {
        if self >= other {
            self
        } else {
            other
        }
    }
}

impl Add for TimeDelta {
    type Output = TimeDelta;

    fn add(self, rhs: TimeDelta) -> TimeDelta {
        TimeDelta(self.0 + rhs.0)
    }
}

impl AddAssign for TimeDelta {
    fn add_assign(&mut self, rhs: TimeDelta) {
        self.0 += rhs.0;
    }
}

impl Sub for TimeDelta {
    type Output = TimeDelta;

    fn sub(self, rhs: TimeDelta) -> TimeDelta {
        TimeDelta(self.0 - rhs.0)
    }
}

impl SubAssign for TimeDelta {
    fn sub_assign(&mut self, rhs: TimeDelta) {
        self.0 -= rhs.0;
    }
}

impl Neg for TimeDelta {
    type Output = TimeDelta;

    fn neg(self) -> TimeDelta {
        TimeDelta(-self.0)
    }
}

impl fmt::Display for TimeDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == i64::MAX {
            write!(f, "inf")
        } else {
            write!(f, "{}us", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(TimeDelta::from_millis(1), TimeDelta::from_micros(1_000));
        assert_eq!(TimeDelta::from_seconds(1), TimeDelta::from_micros(1_000_000));
        assert_eq!(TimeDelta::from_nanos(1_500), TimeDelta::from_micros(1));
        assert_eq!(TimeDelta::from_nanos(-1_500), TimeDelta::from_micros(-1));
    }

    #[test]
    fn test_arithmetic() {
        let a = TimeDelta::from_millis(30);
        let b = TimeDelta::from_millis(12);
        assert_eq!(a + b, TimeDelta::from_millis(42));
        assert_eq!(a - b, TimeDelta::from_millis(18));
        assert_eq!(-b, TimeDelta::from_millis(-12));

        let mut c = a;
        c += b;
        assert_eq!(c, TimeDelta::from_millis(42));
        c -= a;
        assert_eq!(c, b);
    }

    #[test]
    fn test_ordering_and_bounds() {
        assert!(TimeDelta::from_micros(-1).is_negative());
        assert!(!TimeDelta::ZERO.is_negative());
        assert!(TimeDelta::ZERO < TimeDelta::MAX);
        assert_eq!(
            TimeDelta::from_millis(10).min(TimeDelta::from_millis(20)),
            TimeDelta::from_millis(10)
        );
        assert_eq!(
            TimeDelta::from_millis(10).max(TimeDelta::from_millis(20)),
            TimeDelta::from_millis(20)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(TimeDelta::from_micros(42).to_string(), "42us");
        assert_eq!(TimeDelta::MAX.to_string(), "inf");
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&TimeDelta::from_micros(123)).unwrap();
        assert_eq!(json, "123");
        let back: TimeDelta = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TimeDelta::from_micros(123));
    }
}
