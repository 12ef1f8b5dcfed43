//! SQLite statements behind the rollup manager.
//!
//! Nothing here takes the per-resolution lock; callers in [`super`] do.

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;

use crate::{
    models::{
        ContractId, parse_contract_id,
        series::{RefreshPolicyRow, RetentionPolicyRow, RollupBucketRow},
    },
    range::TimeRange,
    resolution::Resolution,
    schema::{refresh_policy, retention_policy, rollup_bucket, rollup_definition},
    tz,
};

use super::policy::RefreshPolicy;

/// One averaged bucket read back for the series compositor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoredBucket {
    /// Owning contract.
    pub contract_id: ContractId,
    /// Bucket start (not shifted).
    pub bucket_start: DateTime<Utc>,
    /// Mean funding rate.
    pub avg_funding_rate: f64,
}

/// True if `define_rollup` ran for this resolution.
pub fn is_defined(conn: &mut SqliteConnection, res: Resolution) -> anyhow::Result<bool> {
    use rollup_definition::dsl as rd;
    let found = rd::rollup_definition
        .filter(rd::resolution.eq(res.code()))
        .select(rd::resolution)
        .first::<String>(conn)
        .optional()?;
    Ok(found.is_some())
}

/// Drop the definition with everything hanging off it, then recreate it empty.
pub fn replace_definition(
    conn: &mut SqliteConnection,
    res: Resolution,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    // Explicit child deletes so the replace holds even if foreign_keys is off.
    diesel::delete(rollup_bucket::table.filter(rollup_bucket::resolution.eq(res.code())))
        .execute(conn)?;
    diesel::delete(refresh_policy::table.filter(refresh_policy::resolution.eq(res.code())))
        .execute(conn)?;
    diesel::delete(retention_policy::table.filter(retention_policy::resolution.eq(res.code())))
        .execute(conn)?;
    diesel::delete(rollup_definition::table.filter(rollup_definition::resolution.eq(res.code())))
        .execute(conn)?;

    diesel::insert_into(rollup_definition::table)
        .values((
            rollup_definition::resolution.eq(res.code()),
            rollup_definition::bucket_secs.eq(res.width().num_seconds()),
            rollup_definition::defined_at.eq(tz::to_rfc3339_millis(now)),
        ))
        .execute(conn)?;
    Ok(())
}

/// Delete this resolution's buckets with `window.start <= bucket_start < window.end`.
pub fn delete_buckets_in(
    conn: &mut SqliteConnection,
    res: Resolution,
    window: TimeRange,
) -> anyhow::Result<usize> {
    use rollup_bucket::dsl as rb;
    let n = diesel::delete(
        rb::rollup_bucket
            .filter(rb::resolution.eq(res.code()))
            .filter(rb::bucket_start.ge(tz::to_rfc3339_millis(window.start)))
            .filter(rb::bucket_start.lt(tz::to_rfc3339_millis(window.end))),
    )
    .execute(conn)?;
    Ok(n)
}

/// Delete this resolution's buckets starting before `cutoff`.
pub fn delete_buckets_before(
    conn: &mut SqliteConnection,
    res: Resolution,
    cutoff: DateTime<Utc>,
) -> anyhow::Result<usize> {
    use rollup_bucket::dsl as rb;
    let n = diesel::delete(
        rb::rollup_bucket
            .filter(rb::resolution.eq(res.code()))
            .filter(rb::bucket_start.lt(tz::to_rfc3339_millis(cutoff))),
    )
    .execute(conn)?;
    Ok(n)
}

/// Insert freshly computed buckets. Callers clear the window first.
pub fn insert_buckets(conn: &mut SqliteConnection, rows: &[RollupBucketRow]) -> anyhow::Result<usize> {
    use rollup_bucket::dsl as rb;
    let mut n = 0;
    for row in rows {
        n += diesel::insert_into(rb::rollup_bucket)
            .values(row)
            .on_conflict((rb::resolution, rb::bucket_start, rb::contract_id))
            .do_update()
            .set((
                rb::avg_funding_rate.eq(row.avg_funding_rate),
                rb::point_count.eq(row.point_count),
            ))
            .execute(conn)?;
    }
    Ok(n)
}

/// Buckets of one resolution with `range.start <= bucket_start < range.end`,
/// ordered by (bucket_start, contract_id).
pub fn load_buckets(
    conn: &mut SqliteConnection,
    res: Resolution,
    contract: Option<ContractId>,
    range: TimeRange,
) -> anyhow::Result<Vec<StoredBucket>> {
    use rollup_bucket::dsl as rb;
    let mut query = rb::rollup_bucket
        .filter(rb::resolution.eq(res.code()))
        .filter(rb::bucket_start.ge(tz::to_rfc3339_millis(range.start)))
        .filter(rb::bucket_start.lt(tz::to_rfc3339_millis(range.end)))
        .select((rb::contract_id, rb::bucket_start, rb::avg_funding_rate))
        .order((rb::bucket_start.asc(), rb::contract_id.asc()))
        .into_boxed();
    if let Some(id) = contract {
        query = query.filter(rb::contract_id.eq(id.to_string()));
    }
    query
        .load::<(String, String, f64)>(conn)?
        .into_iter()
        .map(|(id, start, avg)| {
            Ok(StoredBucket {
                contract_id: parse_contract_id(&id)?,
                bucket_start: tz::parse_ts_to_utc(&start)?,
                avg_funding_rate: avg,
            })
        })
        .collect()
}

/// Every stored bucket row of one resolution, ordered by (bucket_start, contract_id).
pub fn all_bucket_rows(conn: &mut SqliteConnection, res: Resolution) -> anyhow::Result<Vec<RollupBucketRow>> {
    use rollup_bucket::dsl as rb;
    let rows = rb::rollup_bucket
        .filter(rb::resolution.eq(res.code()))
        .order((rb::bucket_start.asc(), rb::contract_id.asc()))
        .select(RollupBucketRow::as_select())
        .load(conn)?;
    Ok(rows)
}

// ----------------------- policies -----------------------

/// Insert or replace the refresh policy of a defined resolution.
pub fn upsert_refresh_policy(
    conn: &mut SqliteConnection,
    res: Resolution,
    policy: &RefreshPolicy,
) -> anyhow::Result<()> {
    use refresh_policy::dsl as rp;
    let start = policy.start_offset.num_seconds();
    let end = policy.end_offset.num_seconds();
    let every = policy.schedule_interval.num_seconds();
    diesel::insert_into(rp::refresh_policy)
        .values((
            rp::resolution.eq(res.code()),
            rp::start_offset_secs.eq(start),
            rp::end_offset_secs.eq(end),
            rp::schedule_interval_secs.eq(every),
        ))
        .on_conflict(rp::resolution)
        .do_update()
        .set((
            rp::start_offset_secs.eq(start),
            rp::end_offset_secs.eq(end),
            rp::schedule_interval_secs.eq(every),
            rp::last_error.eq(None::<String>),
        ))
        .execute(conn)?;
    Ok(())
}

/// Insert or replace the retention horizon of a defined resolution.
pub fn upsert_retention_policy(
    conn: &mut SqliteConnection,
    res: Resolution,
    horizon: Duration,
) -> anyhow::Result<()> {
    use retention_policy::dsl as rt;
    let secs = horizon.num_seconds();
    diesel::insert_into(rt::retention_policy)
        .values((rt::resolution.eq(res.code()), rt::horizon_secs.eq(secs)))
        .on_conflict(rt::resolution)
        .do_update()
        .set(rt::horizon_secs.eq(secs))
        .execute(conn)?;
    Ok(())
}

fn refresh_from_row(row: &RefreshPolicyRow) -> RefreshPolicy {
    RefreshPolicy {
        start_offset: Duration::seconds(row.start_offset_secs),
        end_offset: Duration::seconds(row.end_offset_secs),
        schedule_interval: Duration::seconds(row.schedule_interval_secs),
    }
}

/// Stored refresh policy of one resolution, if any.
pub fn load_refresh_policy(
    conn: &mut SqliteConnection,
    res: Resolution,
) -> anyhow::Result<Option<RefreshPolicy>> {
    use refresh_policy::dsl as rp;
    let row = rp::refresh_policy
        .filter(rp::resolution.eq(res.code()))
        .select(RefreshPolicyRow::as_select())
        .first(conn)
        .optional()?;
    Ok(row.as_ref().map(refresh_from_row))
}

/// Stored retention horizon of one resolution, if any.
pub fn load_retention_policy(
    conn: &mut SqliteConnection,
    res: Resolution,
) -> anyhow::Result<Option<Duration>> {
    use retention_policy::dsl as rt;
    let secs = rt::retention_policy
        .filter(rt::resolution.eq(res.code()))
        .select(rt::horizon_secs)
        .first::<i64>(conn)
        .optional()?;
    Ok(secs.map(Duration::seconds))
}

/// Raw refresh policy rows (bookkeeping included), ordered by resolution code.
pub fn refresh_policy_rows(conn: &mut SqliteConnection) -> anyhow::Result<Vec<RefreshPolicyRow>> {
    use refresh_policy::dsl as rp;
    Ok(rp::refresh_policy
        .order(rp::resolution.asc())
        .select(RefreshPolicyRow::as_select())
        .load(conn)?)
}

/// Raw retention policy rows, ordered by resolution code.
pub fn retention_policy_rows(conn: &mut SqliteConnection) -> anyhow::Result<Vec<RetentionPolicyRow>> {
    use retention_policy::dsl as rt;
    Ok(rt::retention_policy
        .order(rt::resolution.asc())
        .select(RetentionPolicyRow::as_select())
        .load(conn)?)
}

/// Stamp a successful tick and clear the last error.
pub fn record_refresh_success(
    conn: &mut SqliteConnection,
    res: Resolution,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    use refresh_policy::dsl as rp;
    diesel::update(rp::refresh_policy.filter(rp::resolution.eq(res.code())))
        .set((
            rp::last_run_at.eq(Some(tz::to_rfc3339_millis(now))),
            rp::last_error.eq(None::<String>),
        ))
        .execute(conn)?;
    Ok(())
}

/// Keep the failure message for operators; `last_run_at` stays at the last success.
pub fn record_refresh_failure(
    conn: &mut SqliteConnection,
    res: Resolution,
    message: &str,
) -> anyhow::Result<()> {
    use refresh_policy::dsl as rp;
    diesel::update(rp::refresh_policy.filter(rp::resolution.eq(res.code())))
        .set(rp::last_error.eq(Some(message)))
        .execute(conn)?;
    Ok(())
}

/// Stamp a retention sweep.
pub fn record_sweep(conn: &mut SqliteConnection, res: Resolution, now: DateTime<Utc>) -> anyhow::Result<()> {
    use retention_policy::dsl as rt;
    diesel::update(rt::retention_policy.filter(rt::resolution.eq(res.code())))
        .set(rt::last_run_at.eq(Some(tz::to_rfc3339_millis(now))))
        .execute(conn)?;
    Ok(())
}
