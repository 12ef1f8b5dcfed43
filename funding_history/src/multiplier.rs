//! Funding multiplier normalizer.
//!
//! A contract pays funding every `funding_interval` hours. Multiplying its rate
//! by `target_hours / funding_interval` projects it onto another horizon.

use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Horizons materialized in the enriched view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Horizon {
    /// One hour.
    #[serde(rename = "1h")]
    OneHour,
    /// Eight hours, the most common native interval.
    #[serde(rename = "8h")]
    EightHours,
    /// One day.
    #[serde(rename = "1d")]
    OneDay,
    /// 365 days (annualized).
    #[serde(rename = "365d")]
    OneYear,
}

impl Horizon {
    /// Every horizon, shortest first.
    pub const ALL: [Horizon; 4] = [
        Horizon::OneHour,
        Horizon::EightHours,
        Horizon::OneDay,
        Horizon::OneYear,
    ];

    /// Length in hours.
    pub const fn hours(self) -> u32 {
        match self {
            Horizon::OneHour => 1,
            Horizon::EightHours => 8,
            Horizon::OneDay => 24,
            Horizon::OneYear => 8760,
        }
    }

    /// Short code used in config, CLI and column names.
    pub const fn code(self) -> &'static str {
        match self {
            Horizon::OneHour => "1h",
            Horizon::EightHours => "8h",
            Horizon::OneDay => "1d",
            Horizon::OneYear => "365d",
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Unknown horizon code.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown horizon {0:?} (expected 1h, 8h, 1d or 365d)")]
pub struct UnknownHorizon(pub String);

impl FromStr for Horizon {
    type Err = UnknownHorizon;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Horizon::ALL
            .into_iter()
            .find(|h| h.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownHorizon(s.to_string()))
    }
}

/// Multiplier computation failures.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MultiplierError {
    /// A zero funding interval has no meaningful projection.
    #[error("funding interval must be positive")]
    ZeroInterval,
}

/// `target_hours / funding_interval` as an exact decimal.
///
/// ```
/// use funding_history::multiplier::multiplier;
/// assert_eq!(multiplier(8, 1).unwrap().to_string(), "0.125");
/// assert_eq!(multiplier(4, 8760).unwrap().to_string(), "2190");
/// ```
pub fn multiplier(funding_interval: u32, target_hours: u32) -> Result<Decimal, MultiplierError> {
    let target = Decimal::from(target_hours);
    let m = match funding_interval {
        0 => return Err(MultiplierError::ZeroInterval),
        1 => target,
        2 => target / Decimal::TWO,
        4 => target / Decimal::from(4u32),
        8 => target / Decimal::from(8u32),
        n => target / Decimal::from(n),
    };
    Ok(m.normalize())
}

/// [`multiplier`] for one of the materialized horizons.
pub fn horizon_multiplier(funding_interval: u32, horizon: Horizon) -> Result<Decimal, MultiplierError> {
    multiplier(funding_interval, horizon.hours())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr as _;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn reference_values() {
        assert_eq!(multiplier(8, 1).unwrap(), dec("0.125"));
        assert_eq!(multiplier(8, 8).unwrap(), dec("1"));
        assert_eq!(multiplier(1, 24).unwrap(), dec("24"));
        assert_eq!(multiplier(4, 8760).unwrap(), dec("2190"));
    }

    #[test]
    fn special_cases_match_general_division() {
        for interval in [1u32, 2, 4, 8] {
            for h in Horizon::ALL {
                let general = (Decimal::from(h.hours()) / Decimal::from(interval)).normalize();
                assert_eq!(horizon_multiplier(interval, h).unwrap(), general, "{interval}h -> {h}");
            }
        }
    }

    #[test]
    fn odd_intervals_and_zero() {
        assert_eq!(multiplier(3, 24).unwrap(), dec("8"));
        assert_eq!(multiplier(16, 1).unwrap(), dec("0.0625"));
        assert_eq!(multiplier(0, 8), Err(MultiplierError::ZeroInterval));
    }

    #[test]
    fn horizon_codes() {
        assert_eq!("365D".parse::<Horizon>().unwrap(), Horizon::OneYear);
        assert_eq!(Horizon::OneDay.hours(), 24);
        assert!("2w".parse::<Horizon>().is_err());
    }
}
