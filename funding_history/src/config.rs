//! Service configuration.
//!
//! ```toml
//! database_url = "sqlite://funding.db"
//! retention_sweep_interval = "1h"
//!
//! [rollups."5m"]
//! start_offset = "6h"
//! retention = "4d"
//! ```
//!
//! Every `[rollups.*]` field is optional and falls back to the built-in
//! default of that tier. The merged policies are validated by
//! [`ServiceConfig::policies`] before anything uses them.

use anyhow::Context;
use chrono::Duration;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    resolution::Resolution,
    rollup::policy::{MAX_POLICY_SPAN_DAYS, ResolutionPolicy, default_policy},
    span::{format_span, serde_span, serde_span_opt},
};

/// Environment variable read when no `database_url` is configured.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Configuration that parses but cannot be used.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Two `[rollups.*]` keys name the same resolution.
    #[error("[rollups.{first:?}] and [rollups.{second:?}] both configure {resolution}")]
    DuplicateRollup {
        /// The resolution both keys parse to.
        resolution: Resolution,
        /// Key seen first.
        first: String,
        /// Key seen second.
        second: String,
    },
    /// Sweep cadence outside `(0, MAX_POLICY_SPAN_DAYS]`.
    #[error("retention_sweep_interval {span} must be positive and at most {max}")]
    SweepInterval {
        /// Configured cadence as a span string.
        span: String,
        /// The limit as a span string.
        max: String,
    },
}

fn default_sweep_interval() -> Duration {
    Duration::hours(1)
}

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// SQLite URL or path; falls back to `$DATABASE_URL`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// How often the scheduler runs retention sweeps.
    #[serde(default = "default_sweep_interval", with = "serde_span")]
    pub retention_sweep_interval: Duration,
    /// Per-resolution overrides keyed by resolution code.
    #[serde(default)]
    pub rollups: IndexMap<String, RollupOverride>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            retention_sweep_interval: default_sweep_interval(),
            rollups: IndexMap::new(),
        }
    }
}

/// Optional overrides for one tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RollupOverride {
    /// Initial backfill horizon.
    #[serde(default, with = "serde_span_opt")]
    pub backfill: Option<Duration>,
    /// Refresh window start (age).
    #[serde(default, with = "serde_span_opt")]
    pub start_offset: Option<Duration>,
    /// Refresh window end (age).
    #[serde(default, with = "serde_span_opt")]
    pub end_offset: Option<Duration>,
    /// Refresh cadence.
    #[serde(default, with = "serde_span_opt")]
    pub schedule_interval: Option<Duration>,
    /// Retention horizon.
    #[serde(default, with = "serde_span_opt")]
    pub retention: Option<Duration>,
}

impl RollupOverride {
    fn apply(&self, mut p: ResolutionPolicy) -> ResolutionPolicy {
        p.backfill = self.backfill.unwrap_or(p.backfill);
        p.refresh.start_offset = self.start_offset.unwrap_or(p.refresh.start_offset);
        p.refresh.end_offset = self.end_offset.unwrap_or(p.refresh.end_offset);
        p.refresh.schedule_interval = self.schedule_interval.unwrap_or(p.refresh.schedule_interval);
        p.retention = self.retention.unwrap_or(p.retention);
        p
    }
}

impl ServiceConfig {
    /// Parse from TOML text.
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let cfg: Self = toml::from_str(text).context("failed to parse service config TOML")?;
        let every = cfg.retention_sweep_interval;
        if every <= Duration::zero() || every > Duration::days(MAX_POLICY_SPAN_DAYS) {
            return Err(ConfigError::SweepInterval {
                span: format_span(every),
                max: format_span(Duration::days(MAX_POLICY_SPAN_DAYS)),
            }
            .into());
        }
        Ok(cfg)
    }

    /// Read and parse a TOML file.
    pub fn load_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("read config file {}", path.as_ref().display()))?;
        Self::from_toml_str(&text)
    }

    /// Defaults merged with overrides, finest tier first, all validated.
    pub fn policies(&self) -> anyhow::Result<Vec<ResolutionPolicy>> {
        let mut overrides: [Option<(&str, &RollupOverride)>; 3] = [None; 3];
        for (key, o) in &self.rollups {
            let res = key
                .parse::<Resolution>()
                .with_context(|| format!("[rollups.{key:?}]"))?;
            if let Some((first, _)) = overrides[res.index()] {
                return Err(ConfigError::DuplicateRollup {
                    resolution: res,
                    first: first.to_string(),
                    second: key.clone(),
                }
                .into());
            }
            overrides[res.index()] = Some((key.as_str(), o));
        }
        Resolution::ALL
            .into_iter()
            .map(|res| {
                let base = default_policy(res);
                let merged = overrides[res.index()].map_or(base, |(_, o)| o.apply(base));
                merged.validate()?;
                Ok(merged)
            })
            .collect()
    }

    /// Configured database URL, else `$DATABASE_URL`.
    pub fn database_url(&self) -> anyhow::Result<String> {
        match &self.database_url {
            Some(url) => Ok(url.clone()),
            None => shared_utils::get_env_var(DATABASE_URL_ENV)
                .context("no database_url configured and DATABASE_URL is unset"),
        }
    }
}
