//! Rows of the materialized `contract_enriched` projection.

use diesel::prelude::*;

/// A row in [`crate::schema::contract_enriched`](crate::schema::contract_enriched).
///
/// Multipliers are stored as decimal text so no float rounding creeps in.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::contract_enriched, check_for_backend(diesel::sqlite::Sqlite))]
pub struct EnrichedRow {
    /// Contract id text (unique).
    pub id: String,
    /// Base asset.
    pub asset_name: String,
    /// Section name as spelled in the section table.
    pub section_name: String,
    /// Quote currency.
    pub quote_name: String,
    /// Native funding interval in hours.
    pub funding_interval: i32,
    /// Multiplier to a 1h horizon.
    pub multiplier_1h: String,
    /// Multiplier to an 8h horizon.
    pub multiplier_8h: String,
    /// Multiplier to a 1d horizon.
    pub multiplier_1d: String,
    /// Multiplier to a 365d horizon.
    pub multiplier_365d: String,
}
