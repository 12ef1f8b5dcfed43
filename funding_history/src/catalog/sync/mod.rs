//! Catalog synchronization (sections and contracts).
//!
//! ## What this does
//! - Takes a `Catalog` (TOML) and **normalizes** it (trim, case-insensitive dedupe).
//! - Computes a **diff** between the catalog (desired) and the DB (current).
//! - Applies the diff with UPSERTs (idempotent) and optional **prune**.
//!
//! ## Prune deprecates
//! Contracts missing from the catalog are marked `deprecated` instead of being
//! deleted: their funding history and rollup buckets stay, and the enriched
//! view drops them on its next rebuild. Listing a deprecated contract again
//! revives it under the same id.
//!
//! ## Transactions & consistency
//! Read, diff and apply run inside one **`BEGIN IMMEDIATE`** transaction via
//! `SqliteConnection::immediate_transaction`, so the diff cannot go stale
//! between reading and writing.

mod diff;
mod read;

pub use diff::CatalogDiff;

use diesel::SqliteConnection;
use tracing::{info, warn};

use crate::catalog::{
    config::{Catalog, normalize_catalog},
    repo::{set_deprecated, upsert_contract, upsert_section},
};
use crate::models::catalog::{Contract, NewContract};

/// Options for catalog synchronization.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Compute and return the diff without writing.
    pub dry_run: bool,
    /// Deprecate stored contracts that the catalog no longer lists.
    pub prune: bool,
}

fn write_contract(conn: &mut SqliteConnection, c: &Contract) -> anyhow::Result<usize> {
    let id = c.id.to_string();
    upsert_contract(
        conn,
        &NewContract {
            id: &id,
            asset_name: &c.asset_name,
            section_name: &c.section_name,
            quote_name: &c.quote_name,
            funding_interval: i32::try_from(c.funding_interval)?,
            deprecated: c.deprecated,
        },
    )
}

/// Sync the catalog into SQLite and return the diff that was (or would be) applied.
pub fn sync_catalog(
    conn: &mut SqliteConnection,
    mut cat: Catalog,
    opt: SyncOptions,
) -> anyhow::Result<CatalogDiff> {
    let report = normalize_catalog(&mut cat)?;
    if report.contracts_without_section > 0 {
        warn!(
            count = report.contracts_without_section,
            "contracts reference sections the catalog does not list; they stay out of the enriched view"
        );
    }

    let diff = conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
        let current = read::read_current(conn)?;
        let diff = diff::compute_diff(&cat, &current, opt.prune)?;
        if opt.dry_run {
            return Ok(diff);
        }

        for s in &diff.sections_insert {
            upsert_section(conn, s)?;
        }
        for c in diff.contracts_insert.iter().chain(&diff.contracts_update) {
            write_contract(conn, c)?;
        }
        for c in &diff.contracts_deprecate {
            set_deprecated(conn, c.id, true)?;
        }
        Ok(diff)
    })?;

    info!(
        dry_run = opt.dry_run,
        sections = diff.sections_insert.len(),
        inserted = diff.contracts_insert.len(),
        updated = diff.contracts_update.len(),
        deprecated = diff.contracts_deprecate.len(),
        "catalog sync finished"
    );
    Ok(diff)
}
