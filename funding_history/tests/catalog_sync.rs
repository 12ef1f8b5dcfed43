mod common;
use common::{count, fixed_now, fk_check_empty, insert, points_every, setup_db};

use chrono::Duration;
use funding_history::catalog::config::{Catalog, CatalogError, load_catalog_str};
use funding_history::catalog::repo::{all_contracts, get_contract};
use funding_history::catalog::sync::{SyncOptions, sync_catalog};
use funding_history::enriched::{get_enriched, rebuild_enriched_view};
use funding_history::models::catalog::Contract;

use diesel::SqliteConnection;
use uuid::Uuid;

const APPLY: SyncOptions = SyncOptions {
    dry_run: false,
    prune: false,
};
const PRUNE: SyncOptions = SyncOptions {
    dry_run: false,
    prune: true,
};

fn tiny_toml() -> &'static str {
    r#"
sections = ["binance_futures", "bybit_linear"]

[[contracts]]
asset_name = "BTC"
section_name = "binance_futures"
quote_name = "USDT"
funding_interval = 8

[[contracts]]
asset_name = "ETH"
section_name = "binance_futures"
quote_name = "USDT"
funding_interval = 8

[[contracts]]
asset_name = "BTC"
section_name = "bybit_linear"
quote_name = "USDT"
funding_interval = 1
"#
}

fn cat(toml_str: &str) -> Catalog {
    toml::from_str(toml_str).unwrap()
}

fn find(conn: &mut SqliteConnection, asset: &str, section: &str) -> Contract {
    all_contracts(conn)
        .unwrap()
        .into_iter()
        .find(|c| c.asset_name.eq_ignore_ascii_case(asset) && c.section_name == section)
        .unwrap()
}

#[test]
fn sync_happy_path_and_idempotent() {
    let (_db, mut conn) = setup_db();

    let diff = sync_catalog(&mut conn, cat(tiny_toml()), APPLY).expect("sync");
    assert_eq!(diff.sections_insert.len(), 2);
    assert_eq!(diff.contracts_insert.len(), 3);

    let diff2 = sync_catalog(&mut conn, cat(tiny_toml()), APPLY).expect("sync-2");
    assert!(diff2.is_noop());
    assert_eq!(diff2.to_string(), "catalog is up to date\n");

    assert_eq!(count(&mut conn, "section"), 2);
    assert_eq!(count(&mut conn, "contract"), 3);
    fk_check_empty(&mut conn);
}

#[test]
fn dry_run_does_not_write() {
    let (_db, mut conn) = setup_db();

    let diff = sync_catalog(
        &mut conn,
        cat(tiny_toml()),
        SyncOptions {
            dry_run: true,
            prune: true,
        },
    )
    .expect("dry-run");

    assert!(!diff.is_noop());
    assert_eq!(count(&mut conn, "section"), 0);
    assert_eq!(count(&mut conn, "contract"), 0);
}

#[test]
fn changed_interval_updates_in_place() {
    let (_db, mut conn) = setup_db();
    sync_catalog(&mut conn, cat(tiny_toml()), APPLY).unwrap();
    let before = find(&mut conn, "BTC", "binance_futures");

    let changed = tiny_toml().replacen("funding_interval = 8", "funding_interval = 4", 1);
    let diff = sync_catalog(&mut conn, cat(&changed), APPLY).unwrap();
    assert_eq!(diff.contracts_update.len(), 1);
    assert!(diff.contracts_insert.is_empty());

    let after = get_contract(&mut conn, before.id).unwrap().unwrap();
    assert_eq!(after.funding_interval, 4);
    assert_eq!(count(&mut conn, "contract"), 3);
}

#[test]
fn prune_deprecates_and_relisting_revives_the_same_id() {
    let (_db, mut conn) = setup_db();
    sync_catalog(&mut conn, cat(tiny_toml()), APPLY).unwrap();
    let bybit = find(&mut conn, "BTC", "bybit_linear");
    let now = fixed_now();
    insert(
        &mut conn,
        &points_every(bybit.id, now - Duration::hours(1), now, Duration::minutes(5)),
    );

    let without_bybit: String = tiny_toml()
        .split("[[contracts]]")
        .take(3)
        .collect::<Vec<_>>()
        .join("[[contracts]]");

    // Without prune, unlisted contracts are left alone.
    let diff = sync_catalog(&mut conn, cat(&without_bybit), APPLY).unwrap();
    assert!(diff.is_noop());

    let diff = sync_catalog(&mut conn, cat(&without_bybit), PRUNE).unwrap();
    assert_eq!(diff.contracts_deprecate.len(), 1);
    assert_eq!(diff.contracts_deprecate[0].id, bybit.id);
    assert!(get_contract(&mut conn, bybit.id).unwrap().unwrap().deprecated);
    assert_eq!(count(&mut conn, "funding_point"), 13, "history survives prune");

    rebuild_enriched_view(&mut conn).unwrap();
    assert!(get_enriched(&mut conn, bybit.id).unwrap().is_none());

    let diff = sync_catalog(&mut conn, cat(tiny_toml()), PRUNE).unwrap();
    assert_eq!(diff.contracts_update.len(), 1);
    assert_eq!(diff.contracts_update[0].id, bybit.id);
    assert!(!get_contract(&mut conn, bybit.id).unwrap().unwrap().deprecated);

    rebuild_enriched_view(&mut conn).unwrap();
    assert!(get_enriched(&mut conn, bybit.id).unwrap().is_some());
    fk_check_empty(&mut conn);
}

#[test]
fn pinned_ids_are_kept_and_conflicts_rejected() {
    let (_db, mut conn) = setup_db();
    let pinned = Uuid::from_u128(0xb7c);
    let first = format!(
        r#"
sections = ["binance_futures"]

[[contracts]]
id = "{pinned}"
asset_name = "BTC"
section_name = "binance_futures"
quote_name = "USDT"
funding_interval = 8
"#
    );
    sync_catalog(&mut conn, load_catalog_str(&first).unwrap(), APPLY).unwrap();
    assert_eq!(find(&mut conn, "BTC", "binance_futures").id, pinned);

    let other = Uuid::from_u128(0xe7c);
    let second = first.replace(&pinned.to_string(), &other.to_string());
    let err = sync_catalog(&mut conn, cat(&second), APPLY).unwrap_err();
    match err.downcast_ref::<CatalogError>() {
        Some(CatalogError::IdMismatch { stored, wanted, .. }) => {
            assert_eq!((*stored, *wanted), (pinned, other));
        }
        e => panic!("unexpected error: {e:?}"),
    }
    assert_eq!(find(&mut conn, "BTC", "binance_futures").id, pinned);
}

#[test]
fn case_variants_collapse_to_one_contract() {
    let (_db, mut conn) = setup_db();
    let toml_str = r#"
sections = ["Binance_Futures", "binance_futures"]

[[contracts]]
asset_name = "BTC"
section_name = "Binance_Futures"
quote_name = "USDT"
funding_interval = 8

[[contracts]]
asset_name = "btc"
section_name = "binance_futures"
quote_name = "usdt"
funding_interval = 8
"#;
    let diff = sync_catalog(&mut conn, cat(toml_str), APPLY).unwrap();
    assert_eq!(diff.sections_insert.len(), 1);
    assert_eq!(diff.contracts_insert.len(), 1);
    assert_eq!(count(&mut conn, "section"), 1);
    assert_eq!(count(&mut conn, "contract"), 1);
}
