//! Half-open time spans owned by entities.
//!
//! Instants are abstract `i64` units; the caller picks the epoch and the
//! unit (milliseconds in practice). An [`Interval`] can only be built with
//! `start <= end`, including when it is deserialized.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A `[start, end)` time span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawInterval")]
pub struct Interval {
    start: i64,
    end: i64,
}

#[derive(Deserialize)]
struct RawInterval {
    start: i64,
    end: i64,
}

impl TryFrom<RawInterval> for Interval {
    type Error = ValidationError;

    fn try_from(raw: RawInterval) -> Result<Self, Self::Error> {
        Interval::new(raw.start, raw.end)
    }
}

impl Interval {
    /// Create a new interval.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidInterval`] when `end < start`.
    pub fn new(start: i64, end: i64) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    /// Zero-duration interval at `at`.
    pub fn point(at: i64) -> Self {
        Self { start: at, end: at }
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    /// Length of the span, saturating at `i64::MAX`.
    pub fn duration(&self) -> i64 {
        self.end.saturating_sub(self.start)
    }

    /// True when the two half-open spans share at least one instant.
    ///
    /// Touching spans (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Smallest interval covering both.
    pub fn union(&self, other: &Interval) -> Interval {
        Interval {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Same duration, moved by `delta`.
    ///
    /// Both ends saturate at the limits of `i64`, so a span pushed past
    /// either limit is clipped there.
    pub fn shifted(&self, delta: i64) -> Interval {
        Interval {
            start: self.start.saturating_add(delta),
            end: self.end.saturating_add(delta),
        }
    }

    /// Same duration, starting at `start`. The end saturates at `i64::MAX`.
    pub fn starting_at(&self, start: i64) -> Interval {
        Interval {
            start,
            end: start.saturating_add(self.duration()),
        }
    }

    /// Same duration, ending at `end`. The start saturates at `i64::MIN`.
    pub fn ending_at(&self, end: i64) -> Interval {
        Interval {
            start: end.saturating_sub(self.duration()),
            end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_end_before_start() {
        assert_eq!(
            Interval::new(10, 5),
            Err(ValidationError::InvalidInterval { start: 10, end: 5 })
        );
        assert!(Interval::new(5, 5).is_ok());
    }

    #[test]
    fn test_overlap_is_half_open() {
        let a = Interval::new(0, 10).unwrap();
        let b = Interval::new(10, 20).unwrap();
        let c = Interval::new(5, 15).unwrap();
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
        assert!(!Interval::point(5).overlaps(&Interval::point(5)));
    }

    #[test]
    fn test_union_and_shift() {
        let a = Interval::new(0, 10).unwrap();
        let b = Interval::new(30, 40).unwrap();
        assert_eq!(a.union(&b), Interval::new(0, 40).unwrap());
        assert_eq!(a.starting_at(7), Interval::new(7, 17).unwrap());
        assert_eq!(a.ending_at(25), Interval::new(15, 25).unwrap());
        assert_eq!(a.shifted(-3).duration(), 10);
    }

    #[test]
    fn test_extreme_instants_saturate() {
        let all = Interval::new(i64::MIN, i64::MAX).unwrap();
        assert_eq!(all.duration(), i64::MAX);
        assert_eq!(all.shifted(1), Interval::new(i64::MIN + 1, i64::MAX).unwrap());

        let late = Interval::new(i64::MAX - 5, i64::MAX).unwrap();
        assert_eq!(late.starting_at(i64::MAX - 2), Interval::new(i64::MAX - 2, i64::MAX).unwrap());
        let early = Interval::new(i64::MIN, i64::MIN + 10).unwrap();
        assert_eq!(early.ending_at(i64::MIN + 4), Interval::new(i64::MIN, i64::MIN + 4).unwrap());
        assert_eq!(all.starting_at(0), Interval::new(0, i64::MAX).unwrap());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Interval = serde_json::from_str(r#"{"start":1,"end":4}"#).unwrap();
        assert_eq!(ok.duration(), 3);

        let bad = serde_json::from_str::<Interval>(r#"{"start":4,"end":1}"#);
        assert!(bad.is_err());
    }
}
