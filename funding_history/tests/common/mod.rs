#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Integer, Text};
use funding_history::db::{connection, migrate};
use funding_history::models::ContractId;
use funding_history::models::catalog::{NewContract, NewSection};
use funding_history::models::series::FundingPoint;
use funding_history::raw;
use funding_history::schema;
use std::path::PathBuf;
use tempfile::TempDir;

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct BusyTimeout {
    #[diesel(sql_type = Integer, column_name = "timeout")]
    busy_timeout: i32,
}
#[derive(QueryableByName)]
struct Cnt {
    #[diesel(sql_type = BigInt)]
    cnt: i64,
}

pub struct TestDb {
    _dir: TempDir,    // keep alive for the life of the test
    pub path: String, // <tmpdir>/test.db
}

impl TestDb {
    pub fn connect(&self) -> SqliteConnection {
        connection::connect_sqlite(&self.path).expect("connect")
    }
}

pub fn setup_db() -> (TestDb, SqliteConnection) {
    let dir = TempDir::new().expect("tempdir");
    let mut p = PathBuf::from(dir.path());
    p.push("test.db");
    let path = p.to_string_lossy().to_string();

    migrate::run_all(&path).expect("migrations");

    let conn = connection::connect_sqlite(&path).expect("connect");
    (TestDb { _dir: dir, path }, conn)
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal"); // WAL is persistent per DB file

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);

    let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(conn).unwrap();
    assert_eq!(bt.busy_timeout, 5000);
}

pub fn count(conn: &mut SqliteConnection, table: &str) -> i64 {
    let c: Cnt = diesel::sql_query(format!("SELECT COUNT(*) AS cnt FROM {table};"))
        .get_result(conn)
        .unwrap();
    c.cnt
}

pub fn fk_check_empty(conn: &mut SqliteConnection) {
    let c: Cnt = diesel::sql_query("SELECT COUNT(*) AS cnt FROM pragma_foreign_key_check;")
        .get_result(conn)
        .unwrap();
    assert_eq!(c.cnt, 0, "foreign key violations present");
}

/// A fixed, hour-aligned "now" for deterministic windows.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 29, 12, 0, 0).unwrap()
}

pub fn cid(n: u128) -> ContractId {
    uuid::Uuid::from_u128(n)
}

pub fn seed_section(conn: &mut SqliteConnection, name: &str) {
    diesel::insert_into(schema::section::table)
        .values(NewSection { name })
        .execute(conn)
        .unwrap();
}

pub fn seed_contract(
    conn: &mut SqliteConnection,
    id: ContractId,
    (asset, section, quote): (&str, &str, &str),
    funding_interval: i32,
    deprecated: bool,
) {
    let id = id.to_string();
    diesel::insert_into(schema::contract::table)
        .values(NewContract {
            id: &id,
            asset_name: asset,
            section_name: section,
            quote_name: quote,
            funding_interval,
            deprecated,
        })
        .execute(conn)
        .unwrap();
}

/// One section and `n` active 8h contracts with ids `cid(1)..=cid(n)`.
pub fn seed_min_catalog(conn: &mut SqliteConnection, n: u128) -> Vec<ContractId> {
    seed_section(conn, "binance_futures");
    let assets = ["BTC", "ETH", "SOL", "DOGE", "XRP"];
    (1..=n)
        .map(|i| {
            let id = cid(i);
            seed_contract(conn, id, (assets[(i as usize - 1) % assets.len()], "binance_futures", "USDT"), 8, false);
            id
        })
        .collect()
}

/// Deterministic rate for the k-th sample.
pub fn rate(k: i64) -> f64 {
    ((k % 11) as f64 - 5.0) * 1e-5
}

/// Points every `step` in `[start, end]` for `contract`.
pub fn points_every(
    contract: ContractId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
) -> Vec<FundingPoint> {
    let mut out = Vec::new();
    let mut t = start;
    let mut k = 0;
    while t <= end {
        out.push(FundingPoint {
            contract_id: contract,
            timestamp: t,
            funding_rate: rate(k),
        });
        t += step;
        k += 1;
    }
    out
}

pub fn insert(conn: &mut SqliteConnection, points: &[FundingPoint]) -> usize {
    raw::insert_points(conn, points).expect("insert points")
}
