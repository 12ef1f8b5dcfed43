//! bucket.rs: UTC bucket alignment
//!
//! - One stable epoch: Unix (1970-01-01T00:00:00Z).
//! - Fixed-width buckets only; widths are whole milliseconds.
//! - Euclidean division so instants before the epoch still floor downward.
//!
//! All functions assume the input timestamp is UTC.

use chrono::{DateTime, Duration, Utc};

use crate::range::TimeRange;

/// Unix epoch start (1970-01-01T00:00:00Z).
pub const EPOCH_UNIX: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;

/// Number of seconds in a minute.
pub const SECS_PER_MINUTE: i64 = 60;
/// Number of seconds in an hour.
pub const SECS_PER_HOUR: i64 = 60 * SECS_PER_MINUTE;
/// Number of seconds in a day.
pub const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;

fn width_ms(width: Duration) -> i64 {
    let ms = width.num_milliseconds();
    assert!(ms > 0, "bucket width must be positive");
    ms
}

/// Compute the bucket id for a UTC timestamp.
pub fn bucket_id(ts_utc: DateTime<Utc>, width: Duration) -> i64 {
    ts_utc.timestamp_millis().div_euclid(width_ms(width))
}

/// Get the UTC start instant for a bucket id.
pub fn bucket_start_utc(id: i64, width: Duration) -> DateTime<Utc> {
    // i128 keeps the multiply honest for absurd ids; chrono clamps the rest.
    let offset_ms = (id as i128) * (width_ms(width) as i128);
    EPOCH_UNIX + Duration::milliseconds(offset_ms as i64)
}

/// Floor a timestamp to the start of its bucket.
pub fn bucket_floor(ts_utc: DateTime<Utc>, width: Duration) -> DateTime<Utc> {
    bucket_start_utc(bucket_id(ts_utc, width), width)
}

/// Exclusive end instant of the bucket containing `ts_utc` (start + width).
pub fn bucket_end_exclusive(ts_utc: DateTime<Utc>, width: Duration) -> DateTime<Utc> {
    bucket_floor(ts_utc, width) + width
}

/// Round `ts_utc` up to the next bucket boundary (identity if already aligned).
pub fn bucket_ceil(ts_utc: DateTime<Utc>, width: Duration) -> DateTime<Utc> {
    let floor = bucket_floor(ts_utc, width);
    if floor == ts_utc { floor } else { floor + width }
}

/// Shrink a range to the buckets lying entirely inside it.
///
/// Returns `None` when no whole bucket fits.
pub fn align_inward(range: TimeRange, width: Duration) -> Option<TimeRange> {
    let start = bucket_ceil(range.start, width);
    let end = bucket_floor(range.end, width);
    TimeRange::new(start, end).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn five_min() -> Duration {
        Duration::minutes(5)
    }

    #[test]
    fn floor_drops_to_boundary() {
        let t = Utc.with_ymd_and_hms(2025, 1, 2, 3, 7, 59).unwrap();
        assert_eq!(
            bucket_floor(t, five_min()),
            Utc.with_ymd_and_hms(2025, 1, 2, 3, 5, 0).unwrap()
        );
        assert_eq!(
            bucket_end_exclusive(t, five_min()),
            Utc.with_ymd_and_hms(2025, 1, 2, 3, 10, 0).unwrap()
        );
    }

    #[test]
    fn aligned_instant_is_its_own_floor_and_ceil() {
        let t = Utc.with_ymd_and_hms(2025, 1, 2, 4, 0, 0).unwrap();
        assert_eq!(bucket_floor(t, Duration::hours(1)), t);
        assert_eq!(bucket_ceil(t, Duration::hours(1)), t);
    }

    #[test]
    fn pre_epoch_floors_downward() {
        let t = Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 30).unwrap();
        assert_eq!(
            bucket_floor(t, Duration::minutes(1)),
            Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 0).unwrap()
        );
    }

    #[test]
    fn align_inward_keeps_whole_buckets_only() {
        let range = TimeRange::new(
            Utc.with_ymd_and_hms(2025, 1, 2, 3, 2, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 2, 3, 18, 0).unwrap(),
        )
        .unwrap();
        let aligned = align_inward(range, five_min()).unwrap();
        assert_eq!(aligned.start, Utc.with_ymd_and_hms(2025, 1, 2, 3, 5, 0).unwrap());
        assert_eq!(aligned.end, Utc.with_ymd_and_hms(2025, 1, 2, 3, 15, 0).unwrap());

        let narrow = TimeRange::new(
            Utc.with_ymd_and_hms(2025, 1, 2, 3, 1, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 0).unwrap(),
        )
        .unwrap();
        assert!(align_inward(narrow, five_min()).is_none());
    }

    proptest! {
        #[test]
        fn floor_brackets_timestamp(ms in -4_000_000_000_000i64..4_000_000_000_000i64, mins in 1i64..=120) {
            let ts = EPOCH_UNIX + Duration::milliseconds(ms);
            let width = Duration::minutes(mins);
            let start = bucket_floor(ts, width);
            prop_assert!(start <= ts);
            prop_assert!(ts < start + width);
            prop_assert_eq!(bucket_floor(start, width), start);
            prop_assert_eq!((start - EPOCH_UNIX).num_milliseconds().rem_euclid(width.num_milliseconds()), 0);
        }
    }
}
