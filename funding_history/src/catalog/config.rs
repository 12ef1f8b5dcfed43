//! Catalog configuration: parsing, normalization and loading.
//!
//! The TOML catalog lists sections (venues) and the perpetual contracts trading
//! in them:
//!
//! ```toml
//! sections = ["binance_futures", "bybit_linear"]
//!
//! [[contracts]]
//! asset_name = "BTC"
//! section_name = "binance_futures"
//! quote_name = "USDT"
//! funding_interval = 8
//! ```
//!
//! Normalization trims every name, drops sections that repeat case-insensitively
//! (first spelling wins) and drops contracts whose (asset, section, quote)
//! repeats case-insensitively. Contracts may carry an explicit `id`; without
//! one, sync keeps the id already stored for that triple or mints a new one.

use std::collections::HashSet;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog file contents.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Catalog {
    /// Section names.
    #[serde(default)]
    pub sections: Vec<String>,
    /// Contracts.
    #[serde(default)]
    pub contracts: Vec<ContractCfg>,
}

/// One contract entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ContractCfg {
    /// Fixed id; minted on first sync when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// Base asset, e.g. "BTC".
    pub asset_name: String,
    /// Section the contract trades in.
    pub section_name: String,
    /// Quote currency, e.g. "USDT".
    pub quote_name: String,
    /// Funding interval in hours.
    pub funding_interval: u32,
}

impl ContractCfg {
    /// Case-insensitive identity of the contract.
    pub fn folded_key(&self) -> (String, String, String) {
        (
            self.asset_name.to_lowercase(),
            self.section_name.to_lowercase(),
            self.quote_name.to_lowercase(),
        )
    }
}

/// Invalid catalog contents.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// A name was blank after trimming.
    #[error("{field} cannot be empty after trimming")]
    EmptyField {
        /// Which name.
        field: &'static str,
    },
    /// Funding every zero hours is meaningless.
    #[error("contract {asset}/{section}/{quote}: funding_interval must be positive")]
    ZeroFundingInterval {
        /// Asset name.
        asset: String,
        /// Section name.
        section: String,
        /// Quote name.
        quote: String,
    },
    /// Two different contracts claim the same id.
    #[error("contract id {0} is used by more than one contract")]
    DuplicateId(Uuid),
    /// The file pins an id that differs from the one stored for the same contract.
    #[error("contract {asset}/{section}/{quote} is stored as {stored}, catalog says {wanted}")]
    IdMismatch {
        /// Asset name.
        asset: String,
        /// Section name.
        section: String,
        /// Quote name.
        quote: String,
        /// Id in the database.
        stored: Uuid,
        /// Id in the file.
        wanted: Uuid,
    },
}

/// Summary of changes performed during normalization.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NormalizationReport {
    /// Sections dropped as case-insensitive duplicates.
    pub sections_deduped: usize,
    /// Contracts dropped as case-insensitive duplicates.
    pub contracts_deduped: usize,
    /// Contracts naming a section the catalog does not list.
    pub contracts_without_section: usize,
}

fn trimmed(s: &mut String, field: &'static str) -> Result<(), CatalogError> {
    let t = s.trim();
    if t.is_empty() {
        return Err(CatalogError::EmptyField { field });
    }
    if t.len() != s.len() {
        *s = t.to_string();
    }
    Ok(())
}

/// Normalize a catalog in place.
pub fn normalize_catalog(cat: &mut Catalog) -> Result<NormalizationReport, CatalogError> {
    let mut report = NormalizationReport::default();

    let mut seen_sections = HashSet::new();
    let mut sections = Vec::with_capacity(cat.sections.len());
    for mut s in std::mem::take(&mut cat.sections) {
        trimmed(&mut s, "section")?;
        if seen_sections.insert(s.to_lowercase()) {
            sections.push(s);
        } else {
            report.sections_deduped += 1;
        }
    }

    let mut seen_keys = HashSet::new();
    let mut seen_ids = HashSet::new();
    let mut contracts = Vec::with_capacity(cat.contracts.len());
    for mut c in std::mem::take(&mut cat.contracts) {
        trimmed(&mut c.asset_name, "asset_name")?;
        trimmed(&mut c.section_name, "section_name")?;
        trimmed(&mut c.quote_name, "quote_name")?;
        if c.funding_interval == 0 {
            return Err(CatalogError::ZeroFundingInterval {
                asset: c.asset_name,
                section: c.section_name,
                quote: c.quote_name,
            });
        }
        if !seen_keys.insert(c.folded_key()) {
            report.contracts_deduped += 1;
            continue;
        }
        if let Some(id) = c.id {
            if !seen_ids.insert(id) {
                return Err(CatalogError::DuplicateId(id));
            }
        }
        if !seen_sections.contains(&c.section_name.to_lowercase()) {
            report.contracts_without_section += 1;
        }
        contracts.push(c);
    }

    cat.sections = sections;
    cat.contracts = contracts;
    Ok(report)
}

/// Parse and normalize a catalog from a TOML string.
pub fn load_catalog_str(toml_str: &str) -> anyhow::Result<Catalog> {
    let mut cat: Catalog = toml::from_str(toml_str).context("failed to parse catalog TOML")?;
    normalize_catalog(&mut cat).context("normalize_catalog failed")?;
    Ok(cat)
}

/// Read a catalog TOML file from disk, parse and normalize it.
pub fn load_catalog_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<Catalog> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read catalog file {}", path.as_ref().display()))?;
    load_catalog_str(&text)
}
