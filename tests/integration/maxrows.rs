//! Resultset limiting through a running proxy

use mysql::prelude::*;

use crate::{get_proxy_config, get_row_limit, sequence_query, skip_if_not_enabled};

#[test]
fn test_small_select_passes() {
    skip_if_not_enabled!();

    let mut conn = get_proxy_config().conn();
    let rows: Vec<u64> = conn.query("SELECT 1").unwrap();
    assert_eq!(rows, vec![1]);
}

#[test]
fn test_select_at_limit_passes() {
    skip_if_not_enabled!();

    let limit = get_row_limit();
    let mut conn = get_proxy_config().conn();
    let rows: Vec<u64> = conn.query(sequence_query(limit)).unwrap();
    assert_eq!(rows.len() as u64, limit);
    assert_eq!(rows.last().copied(), Some(limit));
}

#[test]
fn test_select_over_limit_returns_nothing() {
    skip_if_not_enabled!();

    let limit = get_row_limit();
    let mut conn = get_proxy_config().conn();
    let rows: Vec<u64> = conn.query(sequence_query(limit + 1)).unwrap();
    assert!(rows.is_empty(), "expected empty result, got {} rows", rows.len());

    // The connection stays usable after a discarded resultset
    let rows: Vec<u64> = conn.query("SELECT 2").unwrap();
    assert_eq!(rows, vec![2]);
}

#[test]
fn test_prepared_statement_over_limit_returns_nothing() {
    skip_if_not_enabled!();

    let limit = get_row_limit();
    let mut conn = get_proxy_config().conn();
    let rows: Vec<u64> = conn.exec(sequence_query(limit + 1), ()).unwrap();
    assert!(rows.is_empty());

    let rows: Vec<u64> = conn.exec("SELECT ?", (3u64,)).unwrap();
    assert_eq!(rows, vec![3]);
}

#[test]
fn test_large_value_over_byte_limit_returns_nothing() {
    skip_if_not_enabled!();

    let mut conn = get_proxy_config().conn();
    // Well above the default 64KiB byte ceiling
    let rows: Vec<String> = conn.query("SELECT REPEAT('x', 200000)").unwrap();
    assert!(rows.is_empty());
}

#[test]
fn test_non_select_statements_pass() {
    skip_if_not_enabled!();

    let mut conn = get_proxy_config().conn();
    conn.query_drop("SET @maxrows_probe = 41").unwrap();
    let value: Option<u64> = conn.query_first("SELECT @maxrows_probe + 1").unwrap();
    assert_eq!(value, Some(42));
}
