//! Enriched contract view: catalog × section with precomputed multipliers.
//!
//! [`rebuild_enriched_view`] is the only writer of `contract_enriched`. It
//! recomputes every row, upserts by id and deletes ids that dropped out, all in
//! one IMMEDIATE transaction. Readers on other connections keep seeing the
//! previous snapshot until commit (WAL), which is why the table needs its
//! primary key: rows are replaced in place instead of truncate + reload.

mod cache;

pub use cache::EnrichedCache;

use std::{
    collections::{HashMap, HashSet},
    str::FromStr,
};

use anyhow::Context;
use diesel::prelude::*;
use rust_decimal::Decimal;
use tracing::info;

use crate::{
    models::{ContractId, catalog::ContractRow, enriched::EnrichedRow, parse_contract_id},
    multiplier::{Horizon, horizon_multiplier},
    schema::{contract, contract_enriched, section},
};

/// Stale ids deleted per statement; stays under SQLite's bound-parameter limit.
const DELETE_CHUNK: usize = 500;

/// Outcome of a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RebuildReport {
    /// Rows written (inserted or replaced).
    pub upserted: usize,
    /// Rows removed because their contract was deprecated, deleted or lost its section.
    pub removed: usize,
}

/// An enriched row with parsed id and decimal multipliers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedContract {
    /// Contract id.
    pub id: ContractId,
    /// Base asset.
    pub asset_name: String,
    /// Section name as spelled in the section table.
    pub section_name: String,
    /// Quote currency.
    pub quote_name: String,
    /// Native funding interval in hours.
    pub funding_interval: u32,
    /// Multipliers in [`Horizon::ALL`] order.
    pub multipliers: [Decimal; 4],
}

impl EnrichedContract {
    /// Multiplier for one horizon.
    pub fn multiplier(&self, horizon: Horizon) -> Decimal {
        self.multipliers[horizon_index(horizon)]
    }
}

fn horizon_index(h: Horizon) -> usize {
    match h {
        Horizon::OneHour => 0,
        Horizon::EightHours => 1,
        Horizon::OneDay => 2,
        Horizon::OneYear => 3,
    }
}

impl TryFrom<EnrichedRow> for EnrichedContract {
    type Error = anyhow::Error;

    fn try_from(row: EnrichedRow) -> Result<Self, Self::Error> {
        let dec = |s: &str| Decimal::from_str(s).with_context(|| format!("bad multiplier {s:?} for {}", row.id));
        Ok(EnrichedContract {
            id: parse_contract_id(&row.id)?,
            multipliers: [
                dec(&row.multiplier_1h)?,
                dec(&row.multiplier_8h)?,
                dec(&row.multiplier_1d)?,
                dec(&row.multiplier_365d)?,
            ],
            funding_interval: u32::try_from(row.funding_interval)?,
            asset_name: row.asset_name,
            section_name: row.section_name,
            quote_name: row.quote_name,
        })
    }
}

/// Compute the enriched rows from the catalog: non-deprecated contracts whose
/// section exists (names compared case-insensitively), ordered by id.
pub fn compute_enriched_rows(conn: &mut SqliteConnection) -> anyhow::Result<Vec<EnrichedRow>> {
    let sections: HashMap<String, String> = section::table
        .select(section::name)
        .load::<String>(conn)?
        .into_iter()
        .map(|name| (name.to_lowercase(), name))
        .collect();

    let contracts: Vec<ContractRow> = contract::table
        .filter(contract::deprecated.eq(false))
        .order(contract::id.asc())
        .select(ContractRow::as_select())
        .load(conn)?;

    let mut rows = Vec::with_capacity(contracts.len());
    for c in contracts {
        let Some(section_name) = sections.get(&c.section_name.to_lowercase()) else {
            continue;
        };
        let interval = u32::try_from(c.funding_interval)
            .with_context(|| format!("contract {} has funding_interval {}", c.id, c.funding_interval))?;
        let m = |h| horizon_multiplier(interval, h).map(|d| d.to_string());
        rows.push(EnrichedRow {
            multiplier_1h: m(Horizon::OneHour)?,
            multiplier_8h: m(Horizon::EightHours)?,
            multiplier_1d: m(Horizon::OneDay)?,
            multiplier_365d: m(Horizon::OneYear)?,
            id: c.id,
            asset_name: c.asset_name,
            section_name: section_name.clone(),
            quote_name: c.quote_name,
            funding_interval: c.funding_interval,
        });
    }
    Ok(rows)
}

/// Rebuild `contract_enriched` wholesale.
pub fn rebuild_enriched_view(conn: &mut SqliteConnection) -> anyhow::Result<RebuildReport> {
    let report = conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
        use contract_enriched::dsl as ce;

        let rows = compute_enriched_rows(conn)?;
        let mut upserted = 0;
        for row in &rows {
            upserted += diesel::insert_into(ce::contract_enriched)
                .values(row)
                .on_conflict(ce::id)
                .do_update()
                .set(row)
                .execute(conn)?;
        }

        let keep: HashSet<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        let stale: Vec<String> = ce::contract_enriched
            .select(ce::id)
            .load::<String>(conn)?
            .into_iter()
            .filter(|id| !keep.contains(id.as_str()))
            .collect();
        let mut removed = 0;
        for chunk in stale.chunks(DELETE_CHUNK) {
            removed += diesel::delete(ce::contract_enriched.filter(ce::id.eq_any(chunk))).execute(conn)?;
        }
        Ok(RebuildReport { upserted, removed })
    })?;
    info!(upserted = report.upserted, removed = report.removed, "enriched view rebuilt");
    Ok(report)
}

/// Every enriched row, ordered by id.
pub fn load_enriched(conn: &mut SqliteConnection) -> anyhow::Result<Vec<EnrichedContract>> {
    contract_enriched::table
        .order(contract_enriched::id.asc())
        .select(EnrichedRow::as_select())
        .load(conn)?
        .into_iter()
        .map(EnrichedContract::try_from)
        .collect()
}

/// One contract's enriched row, if it is in the view.
pub fn get_enriched(conn: &mut SqliteConnection, id: ContractId) -> anyhow::Result<Option<EnrichedContract>> {
    contract_enriched::table
        .find(id.to_string())
        .select(EnrichedRow::as_select())
        .first(conn)
        .optional()?
        .map(EnrichedContract::try_from)
        .transpose()
}

/// The materialized multiplier for `id` at `horizon`; `None` if the contract is
/// not in the view (unknown, deprecated or sectionless).
pub fn get_multiplier(
    conn: &mut SqliteConnection,
    id: ContractId,
    horizon: Horizon,
) -> anyhow::Result<Option<Decimal>> {
    Ok(get_enriched(conn, id)?.map(|e| e.multiplier(horizon)))
}
