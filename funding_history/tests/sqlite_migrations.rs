mod common;
use common::{assert_sqlite_pragmas, cid, count, fk_check_empty, fixed_now, seed_min_catalog, setup_db};

use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_query;
use diesel::sql_types::Integer;
use funding_history::db::{connection::connect_sqlite, migrate};
use funding_history::models::series::FundingPoint;
use funding_history::raw;
use funding_history::range::TimeRange;
use funding_history::resolution::Resolution;
use funding_history::rollup::RollupManager;

#[derive(QueryableByName)]
struct TblCnt {
    #[diesel(sql_type = Integer)]
    cnt: i32,
}

#[test]
fn migrations_apply_and_pragmas_are_set() {
    let (db, mut conn) = setup_db();
    assert_sqlite_pragmas(&mut conn);

    let tbls: TblCnt = sql_query(
        "SELECT COUNT(*) AS cnt
            FROM sqlite_master
            WHERE type='table'
            AND name IN ('section','contract','funding_point','rollup_definition',
                         'rollup_bucket','refresh_policy','retention_policy','contract_enriched');",
    )
    .get_result(&mut conn)
    .unwrap();
    assert_eq!(tbls.cnt, 8);

    // Re-running is a no-op, with or without the URL prefix.
    migrate::run_all(&db.path).expect("second run");
    migrate::run_all(&format!("sqlite://{}", db.path)).expect("url form");

    let mut second = connect_sqlite(&db.path).expect("connect second");
    assert_sqlite_pragmas(&mut second);
}

#[test]
fn non_sqlite_urls_are_rejected() {
    assert!(migrate::run_all("postgres://localhost/funding").is_err());
}

#[test]
fn raw_points_are_insert_or_ignore() {
    let (_db, mut conn) = setup_db();
    let ids = seed_min_catalog(&mut conn, 1);
    let now = fixed_now();
    let p = FundingPoint {
        contract_id: ids[0],
        timestamp: now,
        funding_rate: 0.0001,
    };
    assert_eq!(raw::insert_points(&mut conn, &[p]).unwrap(), 1);
    let changed = FundingPoint { funding_rate: 0.9, ..p };
    assert_eq!(raw::insert_points(&mut conn, &[changed, p]).unwrap(), 0);

    let range = TimeRange::new(now, now + chrono::Duration::seconds(1)).unwrap();
    let stored = raw::load_points(&mut conn, Some(ids[0]), range).unwrap();
    assert_eq!(stored, vec![p]);

    assert_eq!(raw::delete_points_before(&mut conn, now + chrono::Duration::seconds(1)).unwrap(), 1);
    assert_eq!(count(&mut conn, "funding_point"), 0);
}

#[test]
fn points_for_unknown_contracts_violate_foreign_key() {
    let (_db, mut conn) = setup_db();
    let p = FundingPoint {
        contract_id: cid(404),
        timestamp: fixed_now(),
        funding_rate: 0.0,
    };
    let err = raw::insert_points(&mut conn, &[p]).unwrap_err();
    match err.downcast_ref::<DieselError>() {
        Some(DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _)) => {}
        other => panic!("expected FK violation, got {other:?}"),
    }
}

#[test]
fn dropping_a_definition_cascades_to_buckets_and_policies() {
    let (_db, mut conn) = setup_db();
    let ids = seed_min_catalog(&mut conn, 1);
    let now = fixed_now();
    common::insert(
        &mut conn,
        &common::points_every(ids[0], now - chrono::Duration::hours(1), now, chrono::Duration::minutes(5)),
    );

    let mgr = RollupManager::new();
    mgr.install_defaults(&mut conn, now).unwrap();
    assert!(count(&mut conn, "rollup_bucket") > 0);
    assert_eq!(count(&mut conn, "refresh_policy"), 3);

    sql_query("DELETE FROM rollup_definition WHERE resolution = '5m';")
        .execute(&mut conn)
        .unwrap();
    let left: TblCnt = sql_query("SELECT COUNT(*) AS cnt FROM rollup_bucket WHERE resolution = '5m';")
        .get_result(&mut conn)
        .unwrap();
    assert_eq!(left.cnt, 0);
    assert_eq!(count(&mut conn, "refresh_policy"), 2);
    assert_eq!(count(&mut conn, "retention_policy"), 2);
    fk_check_empty(&mut conn);

    let err = mgr
        .backfill_range(&mut conn, Resolution::FiveMinutes, TimeRange::new(now - chrono::Duration::hours(1), now).unwrap())
        .unwrap_err();
    assert!(err.to_string().contains("not defined"));
}

#[test]
fn sqlite_begin_immediate_locking_smoke() {
    let (db, mut conn_a) = setup_db();
    let mut conn_b = connect_sqlite(&db.path).expect("connect second");
    sql_query("PRAGMA busy_timeout = 0;").execute(&mut conn_b).unwrap();

    sql_query("BEGIN IMMEDIATE;")
        .execute(&mut conn_a)
        .expect("begin immediate on first connection");

    let err = sql_query("BEGIN IMMEDIATE;").execute(&mut conn_b);
    match err {
        Err(DieselError::DatabaseError(_, info)) => {
            assert!(info.message().contains("database is locked"));
        }
        other => panic!("expected a lock error, got {other:?}"),
    }

    sql_query("ROLLBACK;")
        .execute(&mut conn_a)
        .expect("rollback first connection");

    sql_query("BEGIN IMMEDIATE;")
        .execute(&mut conn_b)
        .expect("begin immediate after release");
    sql_query("ROLLBACK;")
        .execute(&mut conn_b)
        .expect("rollback second connection");
}
