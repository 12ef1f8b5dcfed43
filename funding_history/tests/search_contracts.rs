mod common;
use common::{cid, seed_contract, seed_section, setup_db};

use diesel::SqliteConnection;
use funding_history::models::ContractId;
use funding_history::search::search_contracts;

fn seed(conn: &mut SqliteConnection) {
    seed_section(conn, "binance_futures");
    seed_section(conn, "bybit_linear");
    seed_section(conn, "okx_swap");
    seed_contract(conn, cid(1), ("BTC", "binance_futures", "USDT"), 8, false);
    seed_contract(conn, cid(2), ("ETH", "binance_futures", "USDT"), 8, false);
    seed_contract(conn, cid(3), ("BTCDOM", "binance_futures", "USDT"), 8, false);
    seed_contract(conn, cid(4), ("WBTC", "binance_futures", "USDT"), 8, false);
    seed_contract(conn, cid(5), ("BTC", "bybit_linear", "USDT"), 1, false);
    seed_contract(conn, cid(6), ("BTC", "okx_swap", "USDT"), 8, true);
}

fn ranked(conn: &mut SqliteConnection, query: &str, limit: usize) -> Vec<(ContractId, u32)> {
    search_contracts(conn, query, limit)
        .unwrap()
        .into_iter()
        .map(|r| (r.contract.id, r.score))
        .collect()
}

#[test]
fn ranks_exact_then_prefix_then_substring() {
    let (_db, mut conn) = setup_db();
    seed(&mut conn);

    assert_eq!(
        ranked(&mut conn, "btc", 20),
        vec![(cid(1), 10_000), (cid(5), 10_000), (cid(3), 7_500), (cid(4), 500)]
    );
}

#[test]
fn query_is_case_insensitive_and_trimmed() {
    let (_db, mut conn) = setup_db();
    seed(&mut conn);
    assert_eq!(ranked(&mut conn, "  BtC ", 20), ranked(&mut conn, "btc", 20));
}

#[test]
fn limit_cuts_after_ranking() {
    let (_db, mut conn) = setup_db();
    seed(&mut conn);
    assert_eq!(ranked(&mut conn, "btc", 2), vec![(cid(1), 10_000), (cid(5), 10_000)]);
    assert!(ranked(&mut conn, "btc", 0).is_empty());
}

#[test]
fn every_token_must_match() {
    let (_db, mut conn) = setup_db();
    seed(&mut conn);
    assert_eq!(ranked(&mut conn, "btc bybit", 20), vec![(cid(5), 17_083)]);
    assert!(ranked(&mut conn, "btc kraken", 20).is_empty());
}

#[test]
fn deprecated_contracts_are_not_searchable() {
    let (_db, mut conn) = setup_db();
    seed(&mut conn);
    assert!(ranked(&mut conn, "okx", 20).is_empty());
    assert!(ranked(&mut conn, "", 20).is_empty());
}

#[test]
fn returns_full_catalog_rows() {
    let (_db, mut conn) = setup_db();
    seed(&mut conn);
    let hits = search_contracts(&mut conn, "eth", 5).unwrap();
    assert_eq!(hits.len(), 1);
    let c = &hits[0].contract;
    assert_eq!(
        (c.asset_name.as_str(), c.section_name.as_str(), c.quote_name.as_str(), c.funding_interval),
        ("ETH", "binance_futures", "USDT", 8)
    );
}
