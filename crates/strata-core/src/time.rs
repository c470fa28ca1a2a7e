//! Nanosecond timestamps and half-open time intervals.
//!
//! Blocks in strata are time-aligned: a block start is always a multiple of
//! the block size. [`UnixNanos::truncate_to`] computes that alignment and
//! [`TimeRange`] models the `[start, end)` interval a block or a bootstrap
//! request covers.

use std::fmt;
use std::ops::{Add, Sub};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A point in time as nanoseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UnixNanos(i64);

impl UnixNanos {
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub fn from_secs(secs: i64) -> Self {
        Self(secs * 1_000_000_000)
    }

    pub const fn nanos(self) -> i64 {
        self.0
    }

    /// Truncate down to the nearest multiple of `block_size`.
    ///
    /// Truncation floors toward negative infinity, so pre-epoch timestamps
    /// still land on an aligned block start.
    pub fn truncate_to(self, block_size: Duration) -> Self {
        let size = block_size.as_nanos() as i64;
        if size == 0 {
            return self;
        }
        Self(self.0 - self.0.rem_euclid(size))
    }
}

impl Add<Duration> for UnixNanos {
    type Output = UnixNanos;

    fn add(self, rhs: Duration) -> UnixNanos {
        UnixNanos(self.0 + rhs.as_nanos() as i64)
    }
}

impl Sub<UnixNanos> for UnixNanos {
    type Output = Duration;

    fn sub(self, rhs: UnixNanos) -> Duration {
        Duration::from_nanos((self.0 - rhs.0).max(0) as u64)
    }
}

impl fmt::Display for UnixNanos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: UnixNanos,
    pub end: UnixNanos,
}

impl TimeRange {
    pub fn new(start: UnixNanos, end: UnixNanos) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, t: UnixNanos) -> bool {
        self.start <= t && t < self.end
    }

    /// True when the two intervals share at least one instant.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// The overlapping part of the two intervals, if any.
    pub fn intersect(&self, other: &TimeRange) -> Option<TimeRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start < end {
            Some(TimeRange { start, end })
        } else {
            None
        }
    }

    /// True when `other` covers this interval entirely.
    pub fn contained_by(&self, other: &TimeRange) -> bool {
        other.start <= self.start && self.end <= other.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(n: i64) -> UnixNanos {
        UnixNanos::from_nanos(n)
    }

    fn range(start: i64, end: i64) -> TimeRange {
        TimeRange::new(ns(start), ns(end))
    }

    // ---------------------------------------------------------------
    // UnixNanos
    // ---------------------------------------------------------------

    #[test]
    fn test_truncate_to_aligned() {
        let block = Duration::from_nanos(100);
        assert_eq!(ns(250).truncate_to(block), ns(200));
        assert_eq!(ns(200).truncate_to(block), ns(200));
        assert_eq!(ns(299).truncate_to(block), ns(200));
        assert_eq!(ns(0).truncate_to(block), ns(0));
    }

    #[test]
    fn test_truncate_to_negative_floors() {
        let block = Duration::from_nanos(100);
        assert_eq!(ns(-1).truncate_to(block), ns(-100));
        assert_eq!(ns(-100).truncate_to(block), ns(-100));
        assert_eq!(ns(-101).truncate_to(block), ns(-200));
    }

    #[test]
    fn test_truncate_to_zero_block_is_identity() {
        assert_eq!(ns(123).truncate_to(Duration::ZERO), ns(123));
    }

    #[test]
    fn test_add_duration() {
        assert_eq!(ns(100) + Duration::from_nanos(50), ns(150));
    }

    #[test]
    fn test_sub_saturates_at_zero() {
        assert_eq!(ns(100) - ns(40), Duration::from_nanos(60));
        assert_eq!(ns(40) - ns(100), Duration::ZERO);
    }

    #[test]
    fn test_from_secs() {
        assert_eq!(UnixNanos::from_secs(2), ns(2_000_000_000));
    }

    // ---------------------------------------------------------------
    // TimeRange
    // ---------------------------------------------------------------

    #[test]
    fn test_contains_half_open() {
        let r = range(10, 20);
        assert!(r.contains(ns(10)));
        assert!(r.contains(ns(19)));
        assert!(!r.contains(ns(20)));
        assert!(!r.contains(ns(9)));
    }

    #[test]
    fn test_overlaps() {
        assert!(range(0, 10).overlaps(&range(5, 15)));
        assert!(range(5, 15).overlaps(&range(0, 10)));
        assert!(range(0, 10).overlaps(&range(0, 10)));
        // Touching endpoints do not overlap (half-open).
        assert!(!range(0, 10).overlaps(&range(10, 20)));
        assert!(!range(10, 20).overlaps(&range(0, 10)));
    }

    #[test]
    fn test_intersect() {
        assert_eq!(range(0, 10).intersect(&range(5, 15)), Some(range(5, 10)));
        assert_eq!(range(0, 10).intersect(&range(10, 20)), None);
        assert_eq!(range(0, 10).intersect(&range(2, 8)), Some(range(2, 8)));
    }

    #[test]
    fn test_contained_by() {
        assert!(range(2, 8).contained_by(&range(0, 10)));
        assert!(range(0, 10).contained_by(&range(0, 10)));
        assert!(!range(0, 11).contained_by(&range(0, 10)));
    }

    #[test]
    fn test_is_empty() {
        assert!(range(10, 10).is_empty());
        assert!(range(11, 10).is_empty());
        assert!(!range(10, 11).is_empty());
    }

    #[test]
    fn test_serde_roundtrip() {
        let r = range(100, 200);
        let json = serde_json::to_string(&r).unwrap();
        let back: TimeRange = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
    }
}
