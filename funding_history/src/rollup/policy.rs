//! Per-resolution refresh and retention policies, plus their validation.
//!
//! Policies are checked when they are configured, never when a tick fires: a
//! bad policy must fail the caller synchronously instead of sitting in the
//! schedule.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::{
    range::TimeRange,
    resolution::Resolution,
    span::{format_span, serde_span},
};

/// Longest span any policy field may hold. Keeps `now - span` far from
/// chrono's range limits.
pub const MAX_POLICY_SPAN_DAYS: i64 = 3650;

fn max_policy_span() -> Duration {
    Duration::days(MAX_POLICY_SPAN_DAYS)
}

/// Configuration rejected at setup time.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// The refresh window would be empty or inverted.
    #[error("{resolution}: end_offset {end} must be smaller than start_offset {start}")]
    OffsetOrder {
        /// Tier the policy belongs to.
        resolution: Resolution,
        /// Start offset as a span string.
        start: String,
        /// End offset as a span string.
        end: String,
    },
    /// The window would reach into the future.
    #[error("{resolution}: end_offset {end} must not be negative")]
    NegativeEndOffset {
        /// Tier the policy belongs to.
        resolution: Resolution,
        /// Offending offset as a span string.
        end: String,
    },
    /// The window cannot hold a single whole bucket, so every tick would be a no-op.
    #[error("{resolution}: refresh window {window} is narrower than one bucket")]
    WindowTooNarrow {
        /// Tier the policy belongs to.
        resolution: Resolution,
        /// Window width as a span string.
        window: String,
    },
    /// Ticks need a positive cadence.
    #[error("{resolution}: schedule_interval must be positive")]
    NonPositiveInterval {
        /// Tier the policy belongs to.
        resolution: Resolution,
    },
    /// Initial backfill must cover something.
    #[error("{resolution}: backfill horizon must be positive")]
    NonPositiveBackfill {
        /// Tier the policy belongs to.
        resolution: Resolution,
    },
    /// Retention must keep data.
    #[error("{resolution}: retention horizon must be positive")]
    NonPositiveRetention {
        /// Tier the policy belongs to.
        resolution: Resolution,
    },
    /// A span beyond [`MAX_POLICY_SPAN_DAYS`].
    #[error("{resolution}: {field} {span} exceeds the {max} limit")]
    SpanTooLong {
        /// Tier the policy belongs to.
        resolution: Resolution,
        /// Policy field name.
        field: &'static str,
        /// Requested span as a span string.
        span: String,
        /// The limit as a span string.
        max: String,
    },
    /// Retention would delete buckets the series compositor still serves.
    #[error("{resolution}: retention {horizon} is shorter than the {coverage} the series reads from this tier")]
    RetentionTooShort {
        /// Tier the policy belongs to.
        resolution: Resolution,
        /// Requested horizon as a span string.
        horizon: String,
        /// Oldest age the compositor reads, as a span string.
        coverage: String,
    },
}

/// The `(start_offset, end_offset, schedule_interval)` triple of one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshPolicy {
    /// How far back each tick reaches; also the tolerated lateness of raw points.
    #[serde(with = "serde_span")]
    pub start_offset: Duration,
    /// How close to "now" each tick stops; keeps the open bucket out.
    #[serde(with = "serde_span")]
    pub end_offset: Duration,
    /// Cadence of ticks.
    #[serde(with = "serde_span")]
    pub schedule_interval: Duration,
}

fn check_cap(resolution: Resolution, field: &'static str, span: Duration) -> Result<(), PolicyError> {
    if span > max_policy_span() {
        return Err(PolicyError::SpanTooLong {
            resolution,
            field,
            span: format_span(span),
            max: format_span(max_policy_span()),
        });
    }
    Ok(())
}

impl RefreshPolicy {
    /// Check the triple for `resolution`.
    pub fn validate(&self, resolution: Resolution) -> Result<(), PolicyError> {
        check_cap(resolution, "start_offset", self.start_offset)?;
        check_cap(resolution, "schedule_interval", self.schedule_interval)?;
        if self.schedule_interval <= Duration::zero() {
            return Err(PolicyError::NonPositiveInterval { resolution });
        }
        if self.end_offset < Duration::zero() {
            return Err(PolicyError::NegativeEndOffset {
                resolution,
                end: format_span(self.end_offset),
            });
        }
        if self.end_offset >= self.start_offset {
            return Err(PolicyError::OffsetOrder {
                resolution,
                start: format_span(self.start_offset),
                end: format_span(self.end_offset),
            });
        }
        let window = self.start_offset - self.end_offset;
        if window < resolution.width() {
            return Err(PolicyError::WindowTooNarrow {
                resolution,
                window: format_span(window),
            });
        }
        Ok(())
    }

    /// `[now - start_offset, now - end_offset)`.
    ///
    /// Only meaningful for a validated policy; an inverted triple yields `None`.
    pub fn window(&self, now: DateTime<Utc>) -> Option<TimeRange> {
        TimeRange::new(now - self.start_offset, now - self.end_offset).ok()
    }
}

/// Check a retention horizon for `resolution`.
pub fn validate_retention(resolution: Resolution, horizon: Duration) -> Result<(), PolicyError> {
    if horizon <= Duration::zero() {
        return Err(PolicyError::NonPositiveRetention { resolution });
    }
    check_cap(resolution, "retention", horizon)?;
    let (_, oldest) = resolution.coverage();
    if horizon < oldest {
        return Err(PolicyError::RetentionTooShort {
            resolution,
            horizon: format_span(horizon),
            coverage: format_span(oldest),
        });
    }
    Ok(())
}

/// Everything needed to stand up one tier from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionPolicy {
    /// Tier.
    pub resolution: Resolution,
    /// Initial backfill reaches `now - backfill`.
    #[serde(with = "serde_span")]
    pub backfill: Duration,
    /// Periodic refresh.
    pub refresh: RefreshPolicy,
    /// Buckets older than this are swept.
    #[serde(with = "serde_span")]
    pub retention: Duration,
}

impl ResolutionPolicy {
    /// Validate every part of the policy.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.backfill <= Duration::zero() {
            return Err(PolicyError::NonPositiveBackfill {
                resolution: self.resolution,
            });
        }
        check_cap(self.resolution, "backfill", self.backfill)?;
        self.refresh.validate(self.resolution)?;
        validate_retention(self.resolution, self.retention)
    }
}

/// Shipped defaults, finest tier first.
pub static DEFAULT_POLICIES: Lazy<[ResolutionPolicy; 3]> = Lazy::new(|| {
    [
        ResolutionPolicy {
            resolution: Resolution::FiveMinutes,
            backfill: Duration::days(3),
            refresh: RefreshPolicy {
                start_offset: Duration::hours(3),
                end_offset: Duration::minutes(5),
                schedule_interval: Duration::minutes(30),
            },
            retention: Duration::days(3),
        },
        ResolutionPolicy {
            resolution: Resolution::FifteenMinutes,
            backfill: Duration::days(7),
            refresh: RefreshPolicy {
                start_offset: Duration::hours(12),
                end_offset: Duration::minutes(15),
                schedule_interval: Duration::hours(1),
            },
            retention: Duration::days(7),
        },
        ResolutionPolicy {
            resolution: Resolution::OneHour,
            backfill: Duration::days(30),
            refresh: RefreshPolicy {
                start_offset: Duration::days(2),
                end_offset: Duration::hours(1),
                schedule_interval: Duration::hours(4),
            },
            retention: Duration::days(30),
        },
    ]
});

/// Default policy for one tier.
pub fn default_policy(resolution: Resolution) -> ResolutionPolicy {
    DEFAULT_POLICIES[resolution.index()]
}
