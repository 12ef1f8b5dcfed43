use std::collections::BTreeMap;

use diesel::prelude::*;

use crate::models::catalog::{Contract, ContractRow};

/// Catalog rows currently stored, keyed for diffing.
pub struct Current {
    /// lower-cased name -> stored spelling
    pub sections: BTreeMap<String, String>,
    /// case-folded (asset, section, quote) -> contract
    pub contracts: BTreeMap<(String, String, String), Contract>,
}

pub fn read_current(conn: &mut SqliteConnection) -> anyhow::Result<Current> {
    use crate::schema::{contract, section};

    let sections = section::table
        .select(section::name)
        .load::<String>(conn)?
        .into_iter()
        .map(|n| (n.to_lowercase(), n))
        .collect();

    let contracts = contract::table
        .select(ContractRow::as_select())
        .load(conn)?
        .into_iter()
        .map(|row| {
            let c = Contract::try_from(row)?;
            let key = (
                c.asset_name.to_lowercase(),
                c.section_name.to_lowercase(),
                c.quote_name.to_lowercase(),
            );
            Ok((key, c))
        })
        .collect::<anyhow::Result<_>>()?;

    Ok(Current { sections, contracts })
}
