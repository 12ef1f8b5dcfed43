//! Trigram similarity in the pg_trgm sense.
//!
//! A string is split into words (maximal runs of alphanumeric characters),
//! each word is padded with two spaces in front and one behind, and every
//! window of three characters is a trigram. Similarity is the size of the
//! shared trigram set over the size of the union.

use std::collections::BTreeSet;

/// One trigram.
pub type Trigram = [char; 3];

/// Distinct trigrams of `s`, lower-cased.
pub fn trigrams(s: &str) -> BTreeSet<Trigram> {
    let lower = s.to_lowercase();
    let mut out = BTreeSet::new();
    for word in lower.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        let padded: Vec<char> = [' ', ' ']
            .into_iter()
            .chain(word.chars())
            .chain(std::iter::once(' '))
            .collect();
        for w in padded.windows(3) {
            out.insert([w[0], w[1], w[2]]);
        }
    }
    out
}

/// `(shared, union)` sizes of two trigram sets.
pub fn overlap(a: &BTreeSet<Trigram>, b: &BTreeSet<Trigram>) -> (usize, usize) {
    let shared = a.intersection(b).count();
    (shared, a.len() + b.len() - shared)
}

/// Trigram similarity of two strings in `[0, 1]`; 0 when neither has a word.
pub fn similarity(a: &str, b: &str) -> f64 {
    match overlap(&trigrams(a), &trigrams(b)) {
        (_, 0) => 0.0,
        (shared, union) => shared as f64 / union as f64,
    }
}
