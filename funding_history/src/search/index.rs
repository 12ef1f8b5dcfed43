//! Pre-filter over the combined `asset section quote` text of each candidate.
//!
//! A token can only score against a field if the field contains it (exact,
//! prefix, boundary and substring rules) or shares a trigram with it
//! (similarity rule). Both are implied by the same test on the combined text,
//! so skipping candidates that fail it never changes the ranking.

use std::collections::BTreeSet;

use super::{SearchCandidate, SearchHit, normalize, rank, tokenize, trigram};

#[derive(Debug, Clone)]
struct Entry {
    haystack: String,
    trigrams: BTreeSet<trigram::Trigram>,
}

/// Candidates plus their lower-cased combined text and its trigrams.
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    candidates: Vec<SearchCandidate>,
    entries: Vec<Entry>,
}

impl SearchIndex {
    /// Index `candidates`, keeping their order for tie-breaks.
    pub fn new(candidates: Vec<SearchCandidate>) -> Self {
        let entries = candidates
            .iter()
            .map(|c| {
                let haystack = c.fields().map(normalize).join(" ");
                let trigrams = trigram::trigrams(&haystack);
                Entry { haystack, trigrams }
            })
            .collect();
        Self { candidates, entries }
    }

    /// Indexed candidates in insertion order.
    pub fn candidates(&self) -> &[SearchCandidate] {
        &self.candidates
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// True when nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Same result as [`super::search`] over [`candidates`](Self::candidates).
    pub fn search(&self, query: &str) -> Vec<SearchHit<'_>> {
        let tokens: Vec<(String, BTreeSet<trigram::Trigram>)> = tokenize(query)
            .into_iter()
            .map(|t| {
                let t = normalize(t);
                let tri = trigram::trigrams(&t);
                (t, tri)
            })
            .collect();

        let survivors = self
            .candidates
            .iter()
            .zip(&self.entries)
            .filter(|(_, e)| {
                tokens
                    .iter()
                    .all(|(t, tri)| e.haystack.contains(t.as_str()) || !e.trigrams.is_disjoint(tri))
            })
            .map(|(c, _)| c);
        rank(query, survivors)
    }
}
