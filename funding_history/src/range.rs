//! Half-open UTC time ranges.

use chrono::{DateTime, Utc};

/// Rejected range bounds.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("empty or inverted range: {start} .. {end}")]
pub struct RangeError {
    /// Requested start.
    pub start: DateTime<Utc>,
    /// Requested end.
    pub end: DateTime<Utc>,
}

/// `[start, end)` in UTC. Never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    /// Inclusive start.
    pub start: DateTime<Utc>,
    /// Exclusive end.
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Build a range, rejecting `end <= start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, RangeError> {
        if end <= start {
            return Err(RangeError { start, end });
        }
        Ok(Self { start, end })
    }

    /// True if `ts` falls inside `[start, end)`.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }

    /// Overlap of two ranges, `None` when they are disjoint.
    pub fn intersect(&self, other: &TimeRange) -> Option<TimeRange> {
        TimeRange::new(self.start.max(other.start), self.end.min(other.end)).ok()
    }
}
