//! Diesel models mapping to the database schema.
//!
//! These types mirror the tables defined in the embedded migrations and in
//! [`crate::schema`] for use with Diesel's Queryable/Insertable APIs:
//! - [`catalog`]: sections and contracts
//! - [`series`]: raw funding points and rollup buckets
//! - [`enriched`]: the materialized `contract_enriched` projection
//!
//! Rows keep timestamps as RFC-3339 text and ids as UUID text; the domain types
//! next to them carry `DateTime<Utc>` and [`Uuid`](uuid::Uuid).

pub mod catalog;
pub mod enriched;
pub mod series;

/// Contracts are keyed by UUID.
pub type ContractId = uuid::Uuid;

/// Parse a stored contract id.
pub(crate) fn parse_contract_id(raw: &str) -> anyhow::Result<ContractId> {
    use anyhow::Context;
    uuid::Uuid::parse_str(raw).with_context(|| format!("bad contract id in database: {raw}"))
}
