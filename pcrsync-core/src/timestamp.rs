//! Timestamp and time base handling.
//!
//! Media time is a signed tick count interpreted against a time base.
//! A distinguished sentinel ([`Timestamp::NONE`]) marks a timestamp as
//! invalid; callers are expected to check [`Timestamp::is_valid`] before
//! relying on ordering.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

/// A time base: the duration of one tick, as a rational fraction of a second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeBase {
    /// Numerator of the tick duration.
    pub num: i64,
    /// Denominator of the tick duration (always positive).
    pub den: i64,
}

impl TimeBase {
    /// Standard MPEG time base (1/90000).
    pub const MPEG: Self = Self { num: 1, den: 90_000 };

    /// Millisecond time base (1/1000).
    pub const MILLISECONDS: Self = Self { num: 1, den: 1000 };

    /// Microsecond time base (1/1000000).
    pub const MICROSECONDS: Self = Self { num: 1, den: 1_000_000 };

    /// Create a new time base.
    ///
    /// # Panics
    ///
    /// Panics if `den` is not positive.
    pub fn new(num: i64, den: i64) -> Self {
        assert!(den > 0, "time base denominator must be positive");
        Self { num, den }
    }

    /// Rescale a tick value from this time base to another.
    ///
    /// Computed in 128-bit to avoid intermediate overflow on large tick
    /// values, truncating toward zero like the reference rescalers.
    pub fn convert(&self, value: i64, target: TimeBase) -> i64 {
        if *self == target {
            return value;
        }
        let scaled = value as i128 * self.num as i128 * target.den as i128
            / (self.den as i128 * target.num as i128);
        scaled as i64
    }

    /// Convert a tick value in this time base to seconds.
    pub fn to_seconds(&self, value: i64) -> f64 {
        value as f64 * self.num as f64 / self.den as f64
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::MPEG
    }
}

/// A timestamp: a tick value with its time base.
///
/// Equality and ordering rescale to the finer of the two time bases first.
/// An invalid timestamp compares equal only to another invalid timestamp and
/// orders before every valid one; algorithmic code checks validity explicitly
/// rather than relying on that ordering.
#[derive(Debug, Clone, Copy)]
pub struct Timestamp {
    /// The raw tick value.
    pub value: i64,
    /// The time base for interpreting the value.
    pub time_base: TimeBase,
}

impl Timestamp {
    /// Tick value representing an invalid/unknown timestamp.
    pub const NONE: i64 = i64::MIN;

    /// Create a new timestamp.
    pub fn new(value: i64, time_base: TimeBase) -> Self {
        Self { value, time_base }
    }

    /// Create an invalid timestamp.
    pub fn none() -> Self {
        Self {
            value: Self::NONE,
            time_base: TimeBase::default(),
        }
    }

    /// The stream origin (tick 0) in the given time base.
    pub fn zero(time_base: TimeBase) -> Self {
        Self { value: 0, time_base }
    }

    /// Check whether this timestamp carries a value.
    pub fn is_valid(&self) -> bool {
        self.value != Self::NONE
    }

    /// Rescale to a different time base. Invalid stays invalid.
    pub fn rescale(&self, target: TimeBase) -> Self {
        if !self.is_valid() {
            return Self::none();
        }
        Self {
            value: self.time_base.convert(self.value, target),
            time_base: target,
        }
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::none()
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        if !self.is_valid() || !other.is_valid() {
            return !self.is_valid() && !other.is_valid();
        }
        let tb = finer(self.time_base, other.time_base);
        self.rescale(tb).value == other.rescale(tb).value
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_valid(), other.is_valid()) {
            (false, false) => Ordering::Equal,
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            (true, true) => {
                let tb = finer(self.time_base, other.time_base);
                self.rescale(tb).value.cmp(&other.rescale(tb).value)
            }
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{:.6}s", self.time_base.to_seconds(self.value))
        } else {
            write!(f, "NONE")
        }
    }
}

/// The finer-grained of two time bases.
fn finer(a: TimeBase, b: TimeBase) -> TimeBase {
    // Smaller tick duration means finer resolution.
    if (a.num as i128 * b.den as i128) <= (b.num as i128 * a.den as i128) {
        a
    } else {
        b
    }
}

/// A duration: a non-sentinel tick span with its time base.
#[derive(Debug, Clone, Copy)]
pub struct Duration {
    /// The raw tick span.
    pub value: i64,
    /// The time base for interpreting the value.
    pub time_base: TimeBase,
}

impl Duration {
    /// Create a new duration.
    pub fn new(value: i64, time_base: TimeBase) -> Self {
        Self { value, time_base }
    }

    /// A zero-length duration.
    pub fn zero() -> Self {
        Self {
            value: 0,
            time_base: TimeBase::default(),
        }
    }

    /// Check whether this duration is zero.
    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    /// Rescale to a different time base.
    pub fn rescale(&self, target: TimeBase) -> Self {
        Self {
            value: self.time_base.convert(self.value, target),
            time_base: target,
        }
    }

    /// Create from milliseconds.
    pub fn from_millis(millis: i64) -> Self {
        Self {
            value: millis,
            time_base: TimeBase::MILLISECONDS,
        }
    }

    /// Create from whole seconds.
    pub fn from_seconds(seconds: i64) -> Self {
        Self {
            value: seconds * 1000,
            time_base: TimeBase::MILLISECONDS,
        }
    }
}

impl Default for Duration {
    fn default() -> Self {
        Self::zero()
    }
}

impl PartialEq for Duration {
    fn eq(&self, other: &Self) -> bool {
        let tb = finer(self.time_base, other.time_base);
        self.rescale(tb).value == other.rescale(tb).value
    }
}

impl Eq for Duration {}

impl PartialOrd for Duration {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Duration {
    fn cmp(&self, other: &Self) -> Ordering {
        let tb = finer(self.time_base, other.time_base);
        self.rescale(tb).value.cmp(&other.rescale(tb).value)
    }
}

impl Add for Duration {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        let rhs = rhs.rescale(self.time_base);
        Self {
            value: self.value + rhs.value,
            time_base: self.time_base,
        }
    }
}

impl Sub for Duration {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        let rhs = rhs.rescale(self.time_base);
        Self {
            value: self.value - rhs.value,
            time_base: self.time_base,
        }
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Self::Output {
        if !self.is_valid() {
            return self;
        }
        let rhs = rhs.rescale(self.time_base);
        Timestamp {
            value: self.value + rhs.value,
            time_base: self.time_base,
        }
    }
}

impl Sub for Timestamp {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        if !self.is_valid() || !rhs.is_valid() {
            return Duration::zero();
        }
        let rhs = rhs.rescale(self.time_base);
        Duration {
            value: self.value - rhs.value,
            time_base: self.time_base,
        }
    }
}
