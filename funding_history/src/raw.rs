//! Raw funding point storage: the ingestion boundary.
//!
//! Points are immutable; re-delivering one is a no-op. The ingestion layer owns
//! lateness and ordering, this module only guarantees the (contract, ts) key.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::{
    models::{
        ContractId, parse_contract_id,
        series::{FundingPoint, NewFundingPoint},
    },
    range::TimeRange,
    schema::funding_point::dsl as fp,
    tz,
};

/// Insert points, ignoring (contract, ts) pairs that already exist.
///
/// Runs in one transaction; returns how many rows were new.
pub fn insert_points(conn: &mut SqliteConnection, points: &[FundingPoint]) -> anyhow::Result<usize> {
    conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
        let mut inserted = 0;
        for p in points {
            let id = p.contract_id.to_string();
            let ts = tz::to_rfc3339_millis(p.timestamp);
            inserted += diesel::insert_into(fp::funding_point)
                .values(NewFundingPoint {
                    contract_id: &id,
                    ts: &ts,
                    funding_rate: p.funding_rate,
                })
                .on_conflict((fp::contract_id, fp::ts))
                .do_nothing()
                .execute(conn)?;
        }
        Ok(inserted)
    })
}

/// Load points with `range.start <= ts < range.end`, ordered by (contract, ts).
///
/// `contract = None` loads every contract.
pub fn load_points(
    conn: &mut SqliteConnection,
    contract: Option<ContractId>,
    range: TimeRange,
) -> anyhow::Result<Vec<FundingPoint>> {
    let start = tz::to_rfc3339_millis(range.start);
    let end = tz::to_rfc3339_millis(range.end);

    let mut query = fp::funding_point
        .filter(fp::ts.ge(start))
        .filter(fp::ts.lt(end))
        .select((fp::contract_id, fp::ts, fp::funding_rate))
        .order((fp::contract_id.asc(), fp::ts.asc()))
        .into_boxed();
    if let Some(id) = contract {
        query = query.filter(fp::contract_id.eq(id.to_string()));
    }

    query
        .load::<(String, String, f64)>(conn)?
        .into_iter()
        .map(|(id, ts, rate)| {
            Ok(FundingPoint {
                contract_id: parse_contract_id(&id)?,
                timestamp: tz::parse_ts_to_utc(&ts)?,
                funding_rate: rate,
            })
        })
        .collect()
}

/// Delete raw points older than `cutoff`. Returns the number removed.
pub fn delete_points_before(conn: &mut SqliteConnection, cutoff: DateTime<Utc>) -> anyhow::Result<usize> {
    let cutoff = tz::to_rfc3339_millis(cutoff);
    let n = diesel::delete(fp::funding_point.filter(fp::ts.lt(cutoff))).execute(conn)?;
    Ok(n)
}
