//! Catalog upserts and reads.
use diesel::prelude::*;
use diesel::{ExpressionMethods, RunQueryDsl, SqliteConnection, insert_into};

use crate::models::{
    ContractId,
    catalog::{Contract, ContractRow, NewContract, NewSection},
};
use crate::schema::{contract, section};

/// Insert a section if missing.
pub fn upsert_section(conn: &mut SqliteConnection, name: &str) -> anyhow::Result<usize> {
    let n = insert_into(section::table)
        .values(&NewSection { name })
        .on_conflict(section::name)
        .do_nothing()
        .execute(conn)?;
    Ok(n)
}

/// Insert a contract or overwrite every column of the row with the same id.
pub fn upsert_contract(conn: &mut SqliteConnection, row: &NewContract<'_>) -> anyhow::Result<usize> {
    let n = insert_into(contract::table)
        .values(row)
        .on_conflict(contract::id)
        .do_update()
        .set(row)
        .execute(conn)?;
    Ok(n)
}

/// Flip the deprecation flag of one contract.
pub fn set_deprecated(conn: &mut SqliteConnection, id: ContractId, deprecated: bool) -> diesel::QueryResult<usize> {
    diesel::update(contract::table.find(id.to_string()))
        .set(contract::deprecated.eq(deprecated))
        .execute(conn)
}

/// Every section name, sorted.
pub fn sections(conn: &mut SqliteConnection) -> anyhow::Result<Vec<String>> {
    let names = section::table.select(section::name).order(section::name.asc()).load(conn)?;
    Ok(names)
}

fn load_contracts(conn: &mut SqliteConnection, only_active: bool) -> anyhow::Result<Vec<Contract>> {
    let mut query = contract::table
        .select(ContractRow::as_select())
        .order((
            contract::asset_name.asc(),
            contract::section_name.asc(),
            contract::quote_name.asc(),
        ))
        .into_boxed();
    if only_active {
        query = query.filter(contract::deprecated.eq(false));
    }
    query.load(conn)?.into_iter().map(Contract::try_from).collect()
}

/// Every contract in catalog order (asset, section, quote).
pub fn all_contracts(conn: &mut SqliteConnection) -> anyhow::Result<Vec<Contract>> {
    load_contracts(conn, false)
}

/// Non-deprecated contracts in catalog order (asset, section, quote).
pub fn active_contracts(conn: &mut SqliteConnection) -> anyhow::Result<Vec<Contract>> {
    load_contracts(conn, true)
}

/// One contract by id.
pub fn get_contract(conn: &mut SqliteConnection, id: ContractId) -> anyhow::Result<Option<Contract>> {
    contract::table
        .find(id.to_string())
        .select(ContractRow::as_select())
        .first(conn)
        .optional()?
        .map(Contract::try_from)
        .transpose()
}
