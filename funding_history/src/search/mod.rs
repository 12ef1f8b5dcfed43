//! Fuzzy contract search.
//!
//! [`score`] rates one token against one field. [`search`] ranks candidates for
//! a whitespace-separated query: each token scores the best of the candidate's
//! asset, section and quote names, a candidate needs every token to score, and
//! its rank is the sum. Ties keep candidate order.
//!
//! [`SearchIndex`] returns the same ranking but skips candidates whose combined
//! text cannot score for some token.

mod index;
mod score;
pub mod trigram;

pub use index::SearchIndex;
pub use score::{
    EXACT_SCORE, LONG_TOKEN_RULES, MatchRule, SHORT_TOKEN_MAX_LEN, SHORT_TOKEN_RULES, normalize,
    rules_for, score,
};

use diesel::SqliteConnection;
use serde::Serialize;

use crate::{
    catalog::repo,
    models::{ContractId, catalog::Contract},
};

/// The searchable text of one contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchCandidate {
    /// Contract the text belongs to.
    pub id: ContractId,
    /// Base asset, e.g. "BTC".
    pub asset_name: String,
    /// Section, e.g. "binance_futures".
    pub section_name: String,
    /// Quote currency, e.g. "USDT".
    pub quote_name: String,
}

impl SearchCandidate {
    /// The three searchable fields in scoring order.
    pub fn fields(&self) -> [&str; 3] {
        [&self.asset_name, &self.section_name, &self.quote_name]
    }

    /// Best score of `token` over the three fields.
    pub fn token_score(&self, token: &str) -> u32 {
        self.fields().into_iter().map(|f| score(f, token)).max().unwrap_or(0)
    }

    /// Summed score over `tokens`, or 0 if any token misses every field.
    pub fn query_score(&self, tokens: &[&str]) -> u32 {
        let mut total = 0u32;
        for t in tokens {
            match self.token_score(t) {
                0 => return 0,
                s => total = total.saturating_add(s),
            }
        }
        total
    }
}

impl From<&Contract> for SearchCandidate {
    fn from(c: &Contract) -> Self {
        SearchCandidate {
            id: c.id,
            asset_name: c.asset_name.clone(),
            section_name: c.section_name.clone(),
            quote_name: c.quote_name.clone(),
        }
    }
}

/// A ranked candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchHit<'a> {
    /// The matching candidate.
    pub candidate: &'a SearchCandidate,
    /// Summed score, always > 0.
    pub score: u32,
}

/// Split a query into tokens. An all-blank query has none.
pub fn tokenize(query: &str) -> Vec<&str> {
    query.split_whitespace().collect()
}

/// Rank `candidates` for `query`, best first; ties keep input order.
pub fn search<'a>(query: &str, candidates: &'a [SearchCandidate]) -> Vec<SearchHit<'a>> {
    rank(query, candidates.iter())
}

pub(crate) fn rank<'a>(
    query: &str,
    candidates: impl Iterator<Item = &'a SearchCandidate>,
) -> Vec<SearchHit<'a>> {
    let tokens = tokenize(query);
    if tokens.is_empty() {
        return Vec::new();
    }
    let mut hits: Vec<SearchHit<'a>> = candidates
        .filter_map(|c| match c.query_score(&tokens) {
            0 => None,
            score => Some(SearchHit { candidate: c, score }),
        })
        .collect();
    // Stable: equal scores stay in candidate order.
    hits.sort_by(|a, b| b.score.cmp(&a.score));
    hits
}

/// A catalog contract with its search score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedContract {
    /// The contract.
    pub contract: Contract,
    /// Summed score.
    pub score: u32,
}

/// Rank the non-deprecated catalog for `query`, keeping at most `limit` hits.
///
/// Candidates are taken in catalog order (asset, section, quote), which is also
/// the tie-break.
pub fn search_contracts(
    conn: &mut SqliteConnection,
    query: &str,
    limit: usize,
) -> anyhow::Result<Vec<RankedContract>> {
    let contracts = repo::active_contracts(conn)?;
    let candidates: Vec<SearchCandidate> = contracts.iter().map(SearchCandidate::from).collect();
    let index = SearchIndex::new(candidates);
    let ranked = index
        .search(query)
        .into_iter()
        .take(limit)
        .map(|hit| (hit.candidate.id, hit.score))
        .collect::<Vec<_>>();

    let mut by_id: std::collections::HashMap<ContractId, Contract> =
        contracts.into_iter().map(|c| (c.id, c)).collect();
    Ok(ranked
        .into_iter()
        .filter_map(|(id, score)| by_id.remove(&id).map(|contract| RankedContract { contract, score }))
        .collect())
}
