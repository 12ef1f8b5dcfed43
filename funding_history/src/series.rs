//! Tiered view compositor: raw points and the three rollups as one series.
//!
//! | tier | window (age) | emitted timestamp |
//! |---|---|---|
//! | raw | `[now-3h, now]` | as observed |
//! | 5m | `[now-3d, now-3h)` | bucket start + 5m |
//! | 15m | `[now-7d, now-3d)` | bucket start + 15m |
//! | 1h | `[now-30d, now-7d)` | bucket start + 1h |
//!
//! Tier windows are selected on the stored timestamp (bucket start for rollups)
//! against a single `now` per query, so an instant on a cutoff belongs to the
//! finer tier only. The caller's `[start, end)` then filters on the emitted
//! timestamp. Anything outside the 30-day window is simply absent.
//!
//! Shifting can land a bucket close exactly on a sample of the next finer tier
//! (the last 5m bucket closes at `now-3h`, where the raw tier starts). Such a
//! pair is emitted once, from the finer tier.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use diesel::SqliteConnection;
use serde::Serialize;

use crate::{
    models::ContractId,
    range::TimeRange,
    raw,
    resolution::Resolution,
    rollup::store,
};

/// Newest age served from rollups; younger data comes from raw points.
pub const RAW_WINDOW_HOURS: i64 = 3;

/// Where a [`SeriesPoint`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// An unaggregated funding point.
    Raw,
    /// A rollup bucket of the given resolution.
    Rollup(Resolution),
}

impl Tier {
    /// Finer tiers rank lower; used to break emitted-timestamp ties.
    pub fn rank(self) -> usize {
        match self {
            Tier::Raw => 0,
            Tier::Rollup(r) => 1 + r.index(),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Raw => f.write_str("raw"),
            Tier::Rollup(r) => write!(f, "{r}"),
        }
    }
}

/// One element of the composited series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    /// Emitted timestamp: observation time for raw, bucket close for rollups.
    pub timestamp: DateTime<Utc>,
    /// Owning contract.
    pub contract_id: ContractId,
    /// Raw rate or bucket mean.
    pub avg_funding_rate: f64,
    /// Source tier.
    pub tier: Tier,
}

/// Series of one contract over `range`, evaluated against the current instant.
pub fn get_series(
    conn: &mut SqliteConnection,
    contract: ContractId,
    range: TimeRange,
) -> anyhow::Result<Vec<SeriesPoint>> {
    get_series_at(conn, contract, range, Utc::now())
}

/// Series of one contract over `range`, as seen at `now`.
pub fn get_series_at(
    conn: &mut SqliteConnection,
    contract: ContractId,
    range: TimeRange,
    now: DateTime<Utc>,
) -> anyhow::Result<Vec<SeriesPoint>> {
    compose(conn, Some(contract), range, now)
}

/// Series of every contract over `range`, ordered by (timestamp, contract_id).
pub fn get_series_all_at(
    conn: &mut SqliteConnection,
    range: TimeRange,
    now: DateTime<Utc>,
) -> anyhow::Result<Vec<SeriesPoint>> {
    compose(conn, None, range, now)
}

/// Window of stored timestamps a rollup tier serves at `now`: `[now - oldest, now - newest)`.
///
/// `None` only when `now` sits so close to chrono's range limit that the window
/// cannot be represented.
pub fn tier_window(res: Resolution, now: DateTime<Utc>) -> Option<TimeRange> {
    let (newest, oldest) = res.coverage();
    TimeRange::new(now.checked_sub_signed(oldest)?, now.checked_sub_signed(newest)?).ok()
}

fn compose(
    conn: &mut SqliteConnection,
    contract: Option<ContractId>,
    range: TimeRange,
    now: DateTime<Utc>,
) -> anyhow::Result<Vec<SeriesPoint>> {
    let mut out = Vec::new();

    // Raw tier is closed at `now`; the half-open store query needs one tick past it.
    let raw_window = TimeRange::new(
        now.checked_sub_signed(Duration::hours(RAW_WINDOW_HOURS)).unwrap_or(DateTime::<Utc>::MIN_UTC),
        now.checked_add_signed(Duration::milliseconds(1)).unwrap_or(DateTime::<Utc>::MAX_UTC),
    )?;
    if let Some(window) = raw_window.intersect(&range) {
        out.extend(raw::load_points(conn, contract, window)?.into_iter().map(|p| SeriesPoint {
            timestamp: p.timestamp,
            contract_id: p.contract_id,
            avg_funding_rate: p.funding_rate,
            tier: Tier::Raw,
        }));
    }

    for res in Resolution::ALL {
        let width = res.width();
        // emitted = bucket_start + width, so filter bucket_start on the range shifted back.
        // A range reaching past chrono's minimum only loses instants no bucket can have.
        let Some(shifted_end) = range.end.checked_sub_signed(width) else {
            continue;
        };
        let shifted_start = range.start.checked_sub_signed(width).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let Some(window) = TimeRange::new(shifted_start, shifted_end)
            .ok()
            .zip(tier_window(res, now))
            .and_then(|(wanted, served)| served.intersect(&wanted))
        else {
            continue;
        };
        out.extend(store::load_buckets(conn, res, contract, window)?.into_iter().map(|b| SeriesPoint {
            timestamp: b.bucket_start + width,
            contract_id: b.contract_id,
            avg_funding_rate: b.avg_funding_rate,
            tier: Tier::Rollup(res),
        }));
    }

    out.sort_by_key(|p| (p.timestamp, p.contract_id, p.tier.rank()));
    // A bucket closing exactly on a finer tier's sample would repeat its
    // timestamp; the finer tier keeps it.
    out.dedup_by(|later, earlier| later.timestamp == earlier.timestamp && later.contract_id == earlier.contract_id);
    Ok(out)
}
