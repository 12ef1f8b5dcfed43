//! Funding-rate history at three resolutions, served as one series, plus
//! per-contract funding multipliers and fuzzy contract search.
//!
//! - [`raw`] stores the ingested point stream.
//! - [`rollup`] keeps 5m / 15m / 1h averages of it, refreshed by [`scheduler`].
//! - [`series`] stitches raw points and rollups into one gap-free series.
//! - [`enriched`] materializes contracts with [`multiplier`]s per horizon.
//! - [`search`] ranks contracts for free-text queries.
//! - [`catalog`] keeps sections and contracts in step with a TOML file.

#![deny(missing_docs)]

pub mod bucket;
pub mod catalog;
pub mod config;
pub mod db;
pub mod enriched;
pub mod models;
pub mod multiplier;
pub mod range;
pub mod raw;
pub mod resolution;
pub mod rollup;
pub mod scheduler;
#[allow(missing_docs)]
pub mod schema;
pub mod search;
pub mod series;
pub mod span;
pub mod tz;
