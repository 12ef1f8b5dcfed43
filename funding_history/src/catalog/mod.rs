//! Contract catalog.
//!
//! Sections and contracts are owned by the layer that lists venues; this crate
//! only needs them present and current. [`config`] parses the TOML catalog,
//! [`sync`] applies it, [`repo`] holds the statements both use.

pub mod config;
pub mod repo;
pub mod sync;
