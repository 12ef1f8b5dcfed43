//! Aggregation policy manager.
//!
//! Keeps the 5m / 15m / 1h rollups of the raw funding stream as derived,
//! overwrite-safe tables.
//!
//! ## Two-step setup
//! [`RollupManager::define_rollup`] creates an empty rollup (replacing any
//! previous one together with its buckets and policies). Data only arrives via
//! [`RollupManager::backfill_range`]; defining never populates.
//!
//! ## Idempotent refresh
//! A backfill aligns its window inward to whole buckets, then inside one
//! `BEGIN IMMEDIATE` transaction deletes the window's buckets and re-inserts
//! averages recomputed from raw points. Running it twice stores the same
//! values; readers on other connections see either the old or the new window,
//! never a half-written one.
//!
//! ## Locking
//! One mutex per resolution serializes refresh, retention and redefinition of
//! that resolution. Resolutions never share a lock.

pub mod policy;
pub mod store;

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Duration, Utc};
use diesel::SqliteConnection;
use tracing::{debug, info, warn};

use crate::{
    bucket,
    models::{ContractId, series::{FundingPoint, RollupBucketRow}},
    range::TimeRange,
    raw,
    resolution::Resolution,
    tz,
};

use policy::{PolicyError, RefreshPolicy, ResolutionPolicy, validate_retention};

/// Operational errors of the rollup manager.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RollupError {
    /// `backfill_range` or a policy call before `define_rollup`.
    #[error("rollup {0} is not defined; call define_rollup first")]
    NotDefined(Resolution),
    /// A tick for a resolution without a refresh policy.
    #[error("rollup {0} has no refresh policy")]
    NoRefreshPolicy(Resolution),
    /// A sweep for a resolution without a retention policy.
    #[error("rollup {0} has no retention policy")]
    NoRetentionPolicy(Resolution),
}

/// Outcome of one backfill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillReport {
    /// Tier written.
    pub resolution: Resolution,
    /// Bucket-aligned window actually recomputed; `None` if no whole bucket fit.
    pub window: Option<TimeRange>,
    /// Raw points read.
    pub points_read: usize,
    /// Buckets present in the window before the refresh.
    pub buckets_replaced: usize,
    /// Buckets written.
    pub buckets_written: usize,
}

/// Outcome of one scheduled refresh tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Instant the tick ran for.
    pub now: DateTime<Utc>,
    /// The backfill it performed.
    pub backfill: BackfillReport,
}

/// Outcome of one retention sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Tier swept.
    pub resolution: Resolution,
    /// Buckets starting before this were deleted.
    pub cutoff: DateTime<Utc>,
    /// How many.
    pub deleted: usize,
}

/// Sole writer of rollup buckets and rollup policies.
#[derive(Debug, Default)]
pub struct RollupManager {
    locks: [Mutex<()>; 3],
}

impl RollupManager {
    /// New manager with one idle lock per resolution.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self, res: Resolution) -> MutexGuard<'_, ()> {
        // The guarded value is `()`, a panicked holder leaves nothing to repair.
        self.locks[res.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// (Re)create an empty rollup. Replaces an existing one with its buckets and policies.
    pub fn define_rollup(&self, conn: &mut SqliteConnection, res: Resolution) -> anyhow::Result<()> {
        let _guard = self.lock(res);
        conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
            store::replace_definition(conn, res, Utc::now())
        })?;
        info!(resolution = %res, "rollup defined (empty)");
        Ok(())
    }

    /// Recompute every whole bucket inside `range` from raw points and overwrite it.
    pub fn backfill_range(
        &self,
        conn: &mut SqliteConnection,
        res: Resolution,
        range: TimeRange,
    ) -> anyhow::Result<BackfillReport> {
        let _guard = self.lock(res);
        let report = backfill_locked(conn, res, range)?;
        info!(
            resolution = %res,
            points = report.points_read,
            replaced = report.buckets_replaced,
            written = report.buckets_written,
            "backfill finished"
        );
        Ok(report)
    }

    /// Store the refresh policy of a defined rollup, replacing any previous one.
    pub fn schedule_policy(
        &self,
        conn: &mut SqliteConnection,
        res: Resolution,
        policy: RefreshPolicy,
    ) -> anyhow::Result<()> {
        policy.validate(res)?;
        let _guard = self.lock(res);
        conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
            ensure_defined(conn, res)?;
            store::upsert_refresh_policy(conn, res, &policy)
        })
    }

    /// Store the retention horizon of a defined rollup, replacing any previous one.
    pub fn set_retention(
        &self,
        conn: &mut SqliteConnection,
        res: Resolution,
        horizon: Duration,
    ) -> anyhow::Result<()> {
        validate_retention(res, horizon)?;
        let _guard = self.lock(res);
        conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
            ensure_defined(conn, res)?;
            store::upsert_retention_policy(conn, res, horizon)
        })
    }

    /// Validate a whole policy, define the rollup if missing, then store refresh and retention.
    ///
    /// Existing buckets are kept; nothing is backfilled.
    pub fn configure_policy(&self, conn: &mut SqliteConnection, policy: &ResolutionPolicy) -> anyhow::Result<()> {
        policy.validate()?;
        let res = policy.resolution;
        let _guard = self.lock(res);
        conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
            if !store::is_defined(conn, res)? {
                store::replace_definition(conn, res, Utc::now())?;
            }
            store::upsert_refresh_policy(conn, res, &policy.refresh)?;
            store::upsert_retention_policy(conn, res, policy.retention)
        })?;
        info!(resolution = %res, "rollup policy configured");
        Ok(())
    }

    /// Stand every tier up from scratch: define, backfill `[now - backfill, now)`, schedule, retain.
    ///
    /// All policies are validated before anything is written.
    pub fn install(
        &self,
        conn: &mut SqliteConnection,
        policies: &[ResolutionPolicy],
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<BackfillReport>> {
        for p in policies {
            p.validate()?;
        }
        let mut reports = Vec::with_capacity(policies.len());
        for p in policies {
            self.define_rollup(conn, p.resolution)?;
            let range = TimeRange::new(now - p.backfill, now)?;
            reports.push(self.backfill_range(conn, p.resolution, range)?);
            self.schedule_policy(conn, p.resolution, p.refresh)?;
            self.set_retention(conn, p.resolution, p.retention)?;
        }
        Ok(reports)
    }

    /// [`install`](Self::install) with the built-in default policies.
    pub fn install_defaults(
        &self,
        conn: &mut SqliteConnection,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<BackfillReport>> {
        self.install(conn, policy::DEFAULT_POLICIES.as_slice(), now)
    }

    /// One scheduled refresh: recompute `[now - start_offset, now - end_offset)`.
    ///
    /// The outcome is recorded on the policy row; a failure leaves the previous
    /// buckets in place for the next tick to overwrite.
    pub fn run_refresh_tick(
        &self,
        conn: &mut SqliteConnection,
        res: Resolution,
        now: DateTime<Utc>,
    ) -> anyhow::Result<TickReport> {
        let _guard = self.lock(res);
        let policy = store::load_refresh_policy(conn, res)?.ok_or(RollupError::NoRefreshPolicy(res))?;
        let window = policy
            .window(now)
            .ok_or_else(|| PolicyError::OffsetOrder {
                resolution: res,
                start: crate::span::format_span(policy.start_offset),
                end: crate::span::format_span(policy.end_offset),
            })?;

        match backfill_locked(conn, res, window) {
            Ok(backfill) => {
                store::record_refresh_success(conn, res, now)?;
                debug!(resolution = %res, written = backfill.buckets_written, "refresh tick done");
                Ok(TickReport { now, backfill })
            }
            Err(e) => {
                if let Err(record_err) = store::record_refresh_failure(conn, res, &format!("{e:#}")) {
                    warn!(resolution = %res, error = %record_err, "could not record refresh failure");
                }
                Err(e)
            }
        }
    }

    /// Delete buckets older than the retention horizon.
    pub fn run_retention_sweep(
        &self,
        conn: &mut SqliteConnection,
        res: Resolution,
        now: DateTime<Utc>,
    ) -> anyhow::Result<SweepReport> {
        let _guard = self.lock(res);
        let horizon = store::load_retention_policy(conn, res)?.ok_or(RollupError::NoRetentionPolicy(res))?;
        let cutoff = now - horizon;
        let deleted = conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
            let n = store::delete_buckets_before(conn, res, cutoff)?;
            store::record_sweep(conn, res, now)?;
            Ok(n)
        })?;
        debug!(resolution = %res, deleted, cutoff = %tz::to_rfc3339_millis(cutoff), "retention sweep done");
        Ok(SweepReport {
            resolution: res,
            cutoff,
            deleted,
        })
    }
}

fn ensure_defined(conn: &mut SqliteConnection, res: Resolution) -> anyhow::Result<()> {
    if store::is_defined(conn, res)? {
        Ok(())
    } else {
        Err(RollupError::NotDefined(res).into())
    }
}

fn backfill_locked(
    conn: &mut SqliteConnection,
    res: Resolution,
    range: TimeRange,
) -> anyhow::Result<BackfillReport> {
    conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
        ensure_defined(conn, res)?;
        let Some(window) = bucket::align_inward(range, res.width()) else {
            return Ok(BackfillReport {
                resolution: res,
                window: None,
                points_read: 0,
                buckets_replaced: 0,
                buckets_written: 0,
            });
        };

        let points = raw::load_points(conn, None, window)?;
        let rows = average_buckets(res, &points);
        let buckets_replaced = store::delete_buckets_in(conn, res, window)?;
        let buckets_written = store::insert_buckets(conn, &rows)?;
        Ok(BackfillReport {
            resolution: res,
            window: Some(window),
            points_read: points.len(),
            buckets_replaced,
            buckets_written,
        })
    })
}

/// Group points by (contract, bucket) and average their rates.
///
/// Sums run in input order, so identical input gives bit-identical output.
pub fn average_buckets(res: Resolution, points: &[FundingPoint]) -> Vec<RollupBucketRow> {
    let width = res.width();
    let mut acc: BTreeMap<(ContractId, i64), (f64, i32)> = BTreeMap::new();
    for p in points {
        let slot = acc
            .entry((p.contract_id, bucket::bucket_id(p.timestamp, width)))
            .or_insert((0.0, 0));
        slot.0 += p.funding_rate;
        slot.1 += 1;
    }
    acc.into_iter()
        .map(|((contract_id, id), (sum, count))| RollupBucketRow {
            resolution: res.code().to_string(),
            bucket_start: tz::to_rfc3339_millis(bucket::bucket_start_utc(id, width)),
            contract_id: contract_id.to_string(),
            avg_funding_rate: sum / f64::from(count),
            point_count: count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn averages_per_contract_and_bucket() {
        let a = uuid::Uuid::from_u128(1);
        let b = uuid::Uuid::from_u128(2);
        let t0 = Utc.with_ymd_and_hms(2026, 1, 29, 10, 0, 0).unwrap();
        let pt = |c, mins, rate| FundingPoint {
            contract_id: c,
            timestamp: t0 + Duration::minutes(mins),
            funding_rate: rate,
        };
        let points = vec![pt(a, 0, 0.001), pt(a, 4, 0.003), pt(a, 5, 0.01), pt(b, 1, -0.002)];

        let rows = average_buckets(Resolution::FiveMinutes, &points);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].contract_id, a.to_string());
        assert_eq!(rows[0].bucket_start, "2026-01-29T10:00:00.000Z");
        assert!((rows[0].avg_funding_rate - 0.002).abs() < 1e-12);
        assert_eq!(rows[0].point_count, 2);
        assert_eq!(rows[1].bucket_start, "2026-01-29T10:05:00.000Z");
        assert_eq!(rows[2].contract_id, b.to_string());
        assert_eq!(rows[2].avg_funding_rate, -0.002);

        let hourly = average_buckets(Resolution::OneHour, &points);
        assert_eq!(hourly.len(), 2);
        assert_eq!(hourly[0].point_count, 3);
    }
}
