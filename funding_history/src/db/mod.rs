//! SQLite access: tuned connections and the embedded schema.
//!
//! Every connection goes through [`connection::connect_sqlite`] so WAL,
//! `foreign_keys` and the busy timeout hold on all of them; rollup refreshes
//! and enriched rebuilds rely on WAL to leave readers on their snapshot.
//! [`migrate::run_all`] applies the embedded migration to a file path or a
//! `sqlite:` URL.
//!
//! ```no_run
//! use funding_history::db::{connection, migrate};
//!
//! let path = std::env::temp_dir().join("funding_history.db");
//! let url = path.to_str().unwrap();
//! migrate::run_all(url).expect("migrations");
//! let _conn = connection::connect_sqlite(url).expect("connect");
//! ```

pub mod connection;
pub mod migrate;
