//! Catalog rows: sections and contracts.
//!
//! Example (no_run)
//! ```no_run
//! use funding_history::schema;
//! use funding_history::models::catalog::*;
//! use diesel::prelude::*;
//!
//! fn seed(conn: &mut SqliteConnection) -> diesel::QueryResult<()> {
//!     diesel::insert_into(schema::section::table)
//!         .values(NewSection { name: "binance_futures" })
//!         .execute(conn)?;
//!     diesel::insert_into(schema::contract::table)
//!         .values(NewContract {
//!             id: "0b8f7f8e-5d0b-4d8c-9d55-6f7c0f1f9f10",
//!             asset_name: "BTC",
//!             section_name: "binance_futures",
//!             quote_name: "USDT",
//!             funding_interval: 8,
//!             deprecated: false,
//!         })
//!         .execute(conn)?;
//!     Ok(())
//! }
//! ```

use diesel::prelude::*;

use super::{ContractId, parse_contract_id};

// ----------------------- section ------------------------

/// A venue/market section row in [`crate::schema::section`](crate::schema::section).
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = crate::schema::section, check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(primary_key(name))]
pub struct Section {
    /// Section name (primary key), e.g. "binance_futures".
    pub name: String,
}

/// Insertable form of [`Section`].
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::section)]
pub struct NewSection<'a> {
    /// Section name (primary key).
    pub name: &'a str,
}

// ----------------------- contract -----------------------

/// A perpetual contract row in [`crate::schema::contract`](crate::schema::contract).
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable, Selectable)]
#[diesel(table_name = crate::schema::contract, check_for_backend(diesel::sqlite::Sqlite))]
pub struct ContractRow {
    /// UUID text, primary key.
    pub id: String,
    /// Base asset, e.g. "BTC".
    pub asset_name: String,
    /// Section the contract trades in; joined case-insensitively.
    pub section_name: String,
    /// Quote currency, e.g. "USDT".
    pub quote_name: String,
    /// Native funding interval in hours (1, 2, 4, 8, ...).
    pub funding_interval: i32,
    /// Deprecated contracts keep their history but leave the enriched view.
    pub deprecated: bool,
}

/// Insertable/changeset form of [`ContractRow`].
#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::contract)]
pub struct NewContract<'a> {
    /// UUID text, primary key.
    pub id: &'a str,
    /// Base asset.
    pub asset_name: &'a str,
    /// Section name.
    pub section_name: &'a str,
    /// Quote currency.
    pub quote_name: &'a str,
    /// Native funding interval in hours.
    pub funding_interval: i32,
    /// Deprecation flag.
    pub deprecated: bool,
}

/// Catalog contract with a parsed id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    /// Contract id.
    pub id: ContractId,
    /// Base asset.
    pub asset_name: String,
    /// Section name.
    pub section_name: String,
    /// Quote currency.
    pub quote_name: String,
    /// Native funding interval in hours.
    pub funding_interval: u32,
    /// Deprecation flag.
    pub deprecated: bool,
}

impl TryFrom<ContractRow> for Contract {
    type Error = anyhow::Error;

    fn try_from(row: ContractRow) -> Result<Self, Self::Error> {
        Ok(Contract {
            id: parse_contract_id(&row.id)?,
            asset_name: row.asset_name,
            section_name: row.section_name,
            quote_name: row.quote_name,
            funding_interval: u32::try_from(row.funding_interval)?,
            deprecated: row.deprecated,
        })
    }
}
