use std::{collections::BTreeSet, fmt};

use uuid::Uuid;

use crate::{
    catalog::{
        config::{Catalog, CatalogError},
        sync::read::Current,
    },
    models::catalog::Contract,
};

/// What needs to change to make DB == TOML.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogDiff {
    /// Sections to insert.
    pub sections_insert: BTreeSet<String>,
    /// Contracts not stored yet (with the id they will get).
    pub contracts_insert: Vec<Contract>,
    /// Stored contracts whose spelling, interval or deprecation changes.
    pub contracts_update: Vec<Contract>,
    /// Active contracts missing from the catalog (prune only).
    pub contracts_deprecate: Vec<Contract>,
}

impl CatalogDiff {
    /// True if there is nothing to write.
    pub fn is_noop(&self) -> bool {
        self.sections_insert.is_empty()
            && self.contracts_insert.is_empty()
            && self.contracts_update.is_empty()
            && self.contracts_deprecate.is_empty()
    }
}

/// Compare the normalized catalog with the stored rows.
///
/// Stored contracts keep their id; new ones take the catalog id or a fresh v4.
pub fn compute_diff(want: &Catalog, current: &Current, prune: bool) -> Result<CatalogDiff, CatalogError> {
    let mut diff = CatalogDiff::default();

    for s in &want.sections {
        if !current.sections.contains_key(&s.to_lowercase()) {
            diff.sections_insert.insert(s.clone());
        }
    }

    let mut wanted_keys = BTreeSet::new();
    for c in &want.contracts {
        let key = c.folded_key();
        wanted_keys.insert(key.clone());
        match current.contracts.get(&key) {
            Some(stored) => {
                if let Some(wanted) = c.id {
                    if wanted != stored.id {
                        return Err(CatalogError::IdMismatch {
                            asset: c.asset_name.clone(),
                            section: c.section_name.clone(),
                            quote: c.quote_name.clone(),
                            stored: stored.id,
                            wanted,
                        });
                    }
                }
                let next = Contract {
                    id: stored.id,
                    asset_name: c.asset_name.clone(),
                    section_name: c.section_name.clone(),
                    quote_name: c.quote_name.clone(),
                    funding_interval: c.funding_interval,
                    deprecated: false,
                };
                if &next != stored {
                    diff.contracts_update.push(next);
                }
            }
            None => diff.contracts_insert.push(Contract {
                id: c.id.unwrap_or_else(Uuid::new_v4),
                asset_name: c.asset_name.clone(),
                section_name: c.section_name.clone(),
                quote_name: c.quote_name.clone(),
                funding_interval: c.funding_interval,
                deprecated: false,
            }),
        }
    }

    if prune {
        diff.contracts_deprecate = current
            .contracts
            .iter()
            .filter(|(key, c)| !c.deprecated && !wanted_keys.contains(*key))
            .map(|(_, c)| c.clone())
            .collect();
    }
    Ok(diff)
}

impl fmt::Display for CatalogDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_noop() {
            return writeln!(f, "catalog is up to date");
        }
        let mut wrote_any = false;
        let mut section = |title: &str,
                           body: &mut dyn FnMut(&mut fmt::Formatter<'_>) -> fmt::Result|
         -> fmt::Result {
            if wrote_any {
                writeln!(f)?;
            }
            writeln!(f, "{title}")?;
            writeln!(f, "{}", "-".repeat(title.len()))?;
            body(f)?;
            wrote_any = true;
            Ok(())
        };
        let line = |f: &mut fmt::Formatter<'_>, sign: char, c: &Contract| {
            writeln!(
                f,
                "{sign} {}/{}/{}  every {}h  ({})",
                c.asset_name, c.section_name, c.quote_name, c.funding_interval, c.id
            )
        };

        if !self.sections_insert.is_empty() {
            section("Sections (INSERT)", &mut |f| {
                for s in &self.sections_insert {
                    writeln!(f, "+ {s}")?;
                }
                Ok(())
            })?;
        }
        if !self.contracts_insert.is_empty() {
            section("Contracts (INSERT)", &mut |f| {
                self.contracts_insert.iter().try_for_each(|c| line(f, '+', c))
            })?;
        }
        if !self.contracts_update.is_empty() {
            section("Contracts (UPDATE)", &mut |f| {
                self.contracts_update.iter().try_for_each(|c| line(f, '~', c))
            })?;
        }
        if !self.contracts_deprecate.is_empty() {
            section("Contracts (DEPRECATE)", &mut |f| {
                self.contracts_deprecate.iter().try_for_each(|c| line(f, '-', c))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::catalog::config::{ContractCfg, normalize_catalog};

    fn stored(n: u128, asset: &str, interval: u32, deprecated: bool) -> Contract {
        Contract {
            id: Uuid::from_u128(n),
            asset_name: asset.into(),
            section_name: "binance_futures".into(),
            quote_name: "USDT".into(),
            funding_interval: interval,
            deprecated,
        }
    }

    fn current(contracts: Vec<Contract>) -> Current {
        Current {
            sections: BTreeMap::from([("binance_futures".to_string(), "binance_futures".to_string())]),
            contracts: contracts
                .into_iter()
                .map(|c| {
                    let key = (
                        c.asset_name.to_lowercase(),
                        c.section_name.to_lowercase(),
                        c.quote_name.to_lowercase(),
                    );
                    (key, c)
                })
                .collect(),
        }
    }

    fn want(assets: &[(&str, u32)]) -> Catalog {
        let mut cat = Catalog {
            sections: vec!["Binance_Futures".into(), "okx_swap".into()],
            contracts: assets
                .iter()
                .map(|(a, i)| ContractCfg {
                    id: None,
                    asset_name: (*a).into(),
                    section_name: "binance_futures".into(),
                    quote_name: "USDT".into(),
                    funding_interval: *i,
                })
                .collect(),
        };
        normalize_catalog(&mut cat).unwrap();
        cat
    }

    #[test]
    fn classifies_insert_update_and_deprecate() {
        let cur = current(vec![
            stored(1, "BTC", 8, false),
            stored(2, "ETH", 8, true),
            stored(3, "DOGE", 8, false),
        ]);
        let diff = compute_diff(&want(&[("BTC", 8), ("ETH", 8), ("SOL", 4)]), &cur, true).unwrap();

        assert_eq!(diff.sections_insert, BTreeSet::from(["okx_swap".to_string()]));
        assert_eq!(diff.contracts_insert.len(), 1);
        assert_eq!(diff.contracts_insert[0].asset_name, "SOL");
        // ETH comes back from deprecation; BTC is unchanged.
        assert_eq!(diff.contracts_update, vec![stored(2, "ETH", 8, false)]);
        assert_eq!(diff.contracts_deprecate, vec![stored(3, "DOGE", 8, false)]);
    }

    #[test]
    fn no_prune_keeps_missing_contracts() {
        let cur = current(vec![stored(1, "BTC", 8, false), stored(3, "DOGE", 8, false)]);
        let diff = compute_diff(&want(&[("BTC", 8)]), &cur, false).unwrap();
        assert!(diff.contracts_deprecate.is_empty());
        assert!(diff.contracts_insert.is_empty());
        assert!(diff.contracts_update.is_empty());
    }

    #[test]
    fn pinned_id_must_match_stored_id() {
        let cur = current(vec![stored(1, "BTC", 8, false)]);
        let mut cat = want(&[("BTC", 8)]);
        cat.contracts[0].id = Some(Uuid::from_u128(99));
        let err = compute_diff(&cat, &cur, false).unwrap_err();
        assert!(matches!(err, CatalogError::IdMismatch { .. }));
    }

    #[test]
    fn display_lists_changes() {
        let cur = current(vec![stored(1, "BTC", 8, false)]);
        let diff = compute_diff(&want(&[("BTC", 4)]), &cur, false).unwrap();
        let text = diff.to_string();
        assert!(text.contains("Sections (INSERT)"));
        assert!(text.contains("~ BTC/binance_futures/USDT  every 4h"));
        assert_eq!(CatalogDiff::default().to_string(), "catalog is up to date\n");
    }
}
