//! Compact duration strings (`"45s"`, `"30m"`, `"3h"`, `"7d"`).
//!
//! Used by config files, CLI flags, and error messages so policies read the
//! same everywhere.

use chrono::Duration;
use serde::{Deserialize, Deserializer, Serializer};

/// Span parse failures.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SpanError {
    /// Nothing to parse.
    #[error("empty span")]
    Empty,
    /// Digits did not form a number.
    #[error("bad span amount in {0:?}")]
    Amount(String),
    /// Unknown suffix.
    #[error("unknown span unit in {0:?} (expected s, m, h or d)")]
    Unit(String),
}

/// Parse `"<amount><unit>"` with unit in `s`, `m`, `h`, `d`.
pub fn parse_span(s: &str) -> Result<Duration, SpanError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(SpanError::Empty);
    }
    let unit_at = s.char_indices().next_back().map_or(0, |(i, _)| i);
    let (digits, unit) = s.split_at(unit_at);
    let amount: i64 = digits
        .trim()
        .parse()
        .map_err(|_| SpanError::Amount(s.to_string()))?;
    let span = match unit {
        "s" => Duration::try_seconds(amount),
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        _ => return Err(SpanError::Unit(s.to_string())),
    };
    // Out of chrono's range.
    span.ok_or_else(|| SpanError::Amount(s.to_string()))
}

/// Format a duration with the largest unit that divides it exactly.
pub fn format_span(d: Duration) -> String {
    let secs = d.num_seconds();
    for (unit_secs, suffix) in [(86_400, "d"), (3_600, "h"), (60, "m")] {
        if secs != 0 && secs % unit_secs == 0 {
            return format!("{}{suffix}", secs / unit_secs);
        }
    }
    format!("{secs}s")
}

/// serde helper: `#[serde(with = "crate::span::serde_span")]`.
pub mod serde_span {
    use super::*;

    /// Serialize as a span string.
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_span(*d))
    }

    /// Deserialize from a span string.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        parse_span(&raw).map_err(serde::de::Error::custom)
    }
}

/// serde helper for `Option<Duration>` fields.
pub mod serde_span_opt {
    use super::*;

    /// Serialize as an optional span string.
    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&format_span(*d)),
            None => s.serialize_none(),
        }
    }

    /// Deserialize from an optional span string.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        raw.map(|r| parse_span(&r).map_err(serde::de::Error::custom))
            .transpose()
    }
}
