//! Raw funding points and rollup bucket rows.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::ContractId;

/// One raw observation from the ingestion stream. Immutable once written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FundingPoint {
    /// Owning contract.
    pub contract_id: ContractId,
    /// Observation instant (UTC).
    pub timestamp: DateTime<Utc>,
    /// Funding rate as a fraction per funding interval (0.0001 = 0.01%).
    pub funding_rate: f64,
}

/// Insertable form of a [`FundingPoint`] in [`crate::schema::funding_point`].
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::funding_point)]
pub struct NewFundingPoint<'a> {
    /// Contract id text.
    pub contract_id: &'a str,
    /// RFC-3339 millisecond timestamp.
    pub ts: &'a str,
    /// Funding rate.
    pub funding_rate: f64,
}

/// A row in [`crate::schema::rollup_bucket`]: one averaged bucket.
///
/// Written only by the rollup manager; overwritten on recomputation.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::rollup_bucket, check_for_backend(diesel::sqlite::Sqlite))]
pub struct RollupBucketRow {
    /// Resolution code ("5m", "15m", "1h").
    pub resolution: String,
    /// Bucket start, RFC-3339 millisecond text.
    pub bucket_start: String,
    /// Contract id text.
    pub contract_id: String,
    /// Mean of the raw funding rates in the bucket.
    pub avg_funding_rate: f64,
    /// How many raw points went into the mean.
    pub point_count: i32,
}

/// A row in [`crate::schema::refresh_policy`].
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = crate::schema::refresh_policy, check_for_backend(diesel::sqlite::Sqlite))]
pub struct RefreshPolicyRow {
    /// Resolution code.
    pub resolution: String,
    /// Window start, seconds before "now".
    pub start_offset_secs: i64,
    /// Window end, seconds before "now".
    pub end_offset_secs: i64,
    /// Tick cadence in seconds.
    pub schedule_interval_secs: i64,
    /// Last successful tick (RFC-3339).
    pub last_run_at: Option<String>,
    /// Message of the last failed tick, cleared on success.
    pub last_error: Option<String>,
}

/// A row in [`crate::schema::retention_policy`].
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = crate::schema::retention_policy, check_for_backend(diesel::sqlite::Sqlite))]
pub struct RetentionPolicyRow {
    /// Resolution code.
    pub resolution: String,
    /// Buckets older than this many seconds are deleted.
    pub horizon_secs: i64,
    /// Last sweep (RFC-3339).
    pub last_run_at: Option<String>,
}
