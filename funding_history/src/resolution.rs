//! Rollup resolutions and the compositor window each one serves.
//!
//! ```
//! use funding_history::resolution::Resolution;
//!
//! let r: Resolution = "15m".parse().unwrap();
//! assert_eq!(r, Resolution::FifteenMinutes);
//! assert_eq!(r.width(), chrono::Duration::minutes(15));
//! ```

use std::{fmt, str::FromStr};

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// One of the three downsampled tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Resolution {
    /// 5-minute buckets.
    #[serde(rename = "5m")]
    FiveMinutes,
    /// 15-minute buckets.
    #[serde(rename = "15m")]
    FifteenMinutes,
    /// 1-hour buckets.
    #[serde(rename = "1h")]
    OneHour,
}

/// Unknown resolution code.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown resolution: {0:?} (expected 5m, 15m or 1h)")]
pub struct UnknownResolution(pub String);

impl Resolution {
    /// All tiers, finest first.
    pub const ALL: [Resolution; 3] = [
        Resolution::FiveMinutes,
        Resolution::FifteenMinutes,
        Resolution::OneHour,
    ];

    /// Bucket width.
    pub fn width(self) -> Duration {
        match self {
            Resolution::FiveMinutes => Duration::minutes(5),
            Resolution::FifteenMinutes => Duration::minutes(15),
            Resolution::OneHour => Duration::hours(1),
        }
    }

    /// Stable code used in the database and on the command line.
    pub const fn code(self) -> &'static str {
        match self {
            Resolution::FiveMinutes => "5m",
            Resolution::FifteenMinutes => "15m",
            Resolution::OneHour => "1h",
        }
    }

    /// Position in [`Resolution::ALL`].
    pub const fn index(self) -> usize {
        match self {
            Resolution::FiveMinutes => 0,
            Resolution::FifteenMinutes => 1,
            Resolution::OneHour => 2,
        }
    }

    /// Age window `(newest, oldest)` this tier serves in the unified series.
    ///
    /// Buckets qualify when `now - oldest <= bucket < now - newest`.
    pub fn coverage(self) -> (Duration, Duration) {
        match self {
            Resolution::FiveMinutes => (Duration::hours(3), Duration::days(3)),
            Resolution::FifteenMinutes => (Duration::days(3), Duration::days(7)),
            Resolution::OneHour => (Duration::days(7), Duration::days(30)),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Resolution {
    type Err = UnknownResolution;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "5m" => Ok(Resolution::FiveMinutes),
            "15m" => Ok(Resolution::FifteenMinutes),
            "1h" => Ok(Resolution::OneHour),
            other => Err(UnknownResolution(other.to_string())),
        }
    }
}
