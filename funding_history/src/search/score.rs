//! Match-quality scoring of one search token against one field.
//!
//! Scoring is an ordered rule table; the first rule that fires decides the
//! score. Which table applies depends on the token length (in characters):
//! tokens of one or two characters use [`SHORT_TOKEN_RULES`], longer ones use
//! [`LONG_TOKEN_RULES`]. All arithmetic truncates.

use super::trigram;

/// Tokens up to this many characters count as short.
pub const SHORT_TOKEN_MAX_LEN: usize = 2;

/// Score of an exact (case-insensitive) match. Nothing scores higher.
pub const EXACT_SCORE: u32 = 10_000;

/// One scoring rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchRule {
    /// Field equals token.
    Exact {
        /// Score when it fires.
        score: u32,
    },
    /// Field starts with token: `base + span * token_len / field_len`.
    Prefix {
        /// Fixed part.
        base: u32,
        /// Part scaled by how much of the field the token covers.
        span: u32,
    },
    /// Token occurs right after a word boundary (start or a char outside `[a-z0-9]`).
    Boundary {
        /// Score when it fires.
        score: u32,
        /// Also require a boundary right after the token.
        whole_word: bool,
    },
    /// Token occurs anywhere.
    Substring {
        /// Score when it fires.
        score: u32,
    },
    /// Trigram similarity above `threshold` scores `floor(similarity * scale)`.
    Similarity {
        /// Exclusive lower bound.
        threshold: f64,
        /// Multiplier applied to the similarity.
        scale: u32,
    },
}

/// Rules for tokens of at most [`SHORT_TOKEN_MAX_LEN`] characters.
pub const SHORT_TOKEN_RULES: [MatchRule; 4] = [
    MatchRule::Exact { score: EXACT_SCORE },
    MatchRule::Prefix { base: 8000, span: 2000 },
    MatchRule::Boundary {
        score: 5000,
        whole_word: true,
    },
    MatchRule::Substring { score: 300 },
];

/// Rules for longer tokens.
pub const LONG_TOKEN_RULES: [MatchRule; 5] = [
    MatchRule::Exact { score: EXACT_SCORE },
    MatchRule::Prefix { base: 5000, span: 5000 },
    MatchRule::Boundary {
        score: 2000,
        whole_word: false,
    },
    MatchRule::Substring { score: 500 },
    MatchRule::Similarity {
        threshold: 0.2,
        scale: 300,
    },
];

/// The rule table used for a (normalized) token.
pub fn rules_for(token: &str) -> &'static [MatchRule] {
    if token.chars().count() <= SHORT_TOKEN_MAX_LEN {
        &SHORT_TOKEN_RULES
    } else {
        &LONG_TOKEN_RULES
    }
}

impl MatchRule {
    /// Score if this rule fires for already normalized `field` and `token`.
    pub fn apply(&self, field: &str, token: &str) -> Option<u32> {
        match *self {
            MatchRule::Exact { score } => (field == token).then_some(score),
            MatchRule::Prefix { base, span } => field.starts_with(token).then(|| {
                let token_len = token.chars().count() as u64;
                let field_len = field.chars().count().max(1) as u64;
                base + (u64::from(span) * token_len / field_len) as u32
            }),
            MatchRule::Boundary { score, whole_word } => {
                boundary_match(field, token, whole_word).then_some(score)
            }
            MatchRule::Substring { score } => field.contains(token).then_some(score),
            MatchRule::Similarity { threshold, scale } => {
                let (shared, union) = trigram::overlap(&trigram::trigrams(field), &trigram::trigrams(token));
                if union == 0 || shared as f64 / union as f64 <= threshold {
                    return None;
                }
                // floor(similarity * scale) without float rounding.
                Some((shared as u64 * u64::from(scale) / union as u64) as u32)
            }
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit()
}

/// True if some occurrence of `token` in `field` starts at a word boundary
/// (and, with `whole_word`, also ends at one). Overlapping occurrences count.
fn boundary_match(field: &str, token: &str, whole_word: bool) -> bool {
    field.char_indices().any(|(i, _)| {
        let rest = &field[i..];
        if !rest.starts_with(token) {
            return false;
        }
        let starts_clean = field[..i].chars().next_back().is_none_or(|c| !is_word_char(c));
        let ends_clean = !whole_word || rest[token.len()..].chars().next().is_none_or(|c| !is_word_char(c));
        starts_clean && ends_clean
    })
}

/// Trim and lower-case one input.
pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Match quality of `token` against `field`: 0 for no match, higher is better.
///
/// Total over all inputs; an empty field or token (after trimming) scores 0.
///
/// ```
/// use funding_history::search::score;
/// assert_eq!(score("BTC", "btc"), 10_000);
/// assert_eq!(score("BTCUSDT", "BTC"), 7142);
/// assert_eq!(score("ETHUSDT", "BT"), 0);
/// ```
pub fn score(field: &str, token: &str) -> u32 {
    let field = normalize(field);
    let token = normalize(token);
    if field.is_empty() || token.is_empty() {
        return 0;
    }
    rules_for(&token)
        .iter()
        .find_map(|rule| rule.apply(&field, &token))
        .unwrap_or(0)
}
