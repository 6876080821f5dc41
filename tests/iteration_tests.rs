#![cfg(feature = "redb")]

mod common;

use common::*;
use multimap_cache::prelude::*;
use multimap_cache::{EngineError, StateError};
use std::thread;

fn ids(rows: &[Record]) -> Vec<i32> {
    rows.iter()
        .map(|row| match row.get("id") {
            Some(Value::Int(id)) => *id,
            other => panic!("row without an id: {other:?}"),
        })
        .collect()
}

#[test]
fn test_scan_expands_tuples_in_key_order() {
    let dir = test_dir();
    let cache = Cache::open_with(people_config(dir.path(), "scan")).unwrap();
    cache.add(person(3, "c1")).unwrap();
    cache.add(person(1, "a1")).unwrap();
    cache.add(person(2, "b1")).unwrap();
    cache.add(person(3, "c2")).unwrap();
    cache.add(person(1, "a2")).unwrap();
    cache.add(person(3, "c3")).unwrap();

    let rows = scan_all(&cache);
    assert_eq!(rows.len(), 6);
    assert_eq!(ids(&rows), vec![1, 1, 2, 3, 3, 3]);
    assert_eq!(names(&rows), vec!["a1", "a2", "b1", "c1", "c2", "c3"]);
    // The key column comes first in every row.
    assert_eq!(rows[0].first().map(|(name, _)| name), Some("id"));
}

#[test]
fn test_empty_cache_scan_ends_immediately() {
    let dir = test_dir();
    let cache = Cache::open_with(people_config(dir.path(), "empty")).unwrap();
    let mut iter = cache.iter().unwrap();
    assert!(iter.next().is_none());
    assert!(iter.next().is_none());
}

#[test]
fn test_lookup_all_follows_key_order_given() {
    let dir = test_dir();
    let cache = Cache::open_with(people_config(dir.path(), "lookups")).unwrap();
    cache.add(person(1, "a")).unwrap();
    cache.add(person(2, "b")).unwrap();
    cache.add(person(3, "c1")).unwrap();
    cache.add(person(3, "c2")).unwrap();

    let rows = cache.lookup_all([3, 9, 1]).unwrap();
    assert_eq!(names(&rows), vec!["c1", "c2", "a"]);
    assert!(cache.lookup(42).unwrap().is_empty());
}

#[test]
fn test_null_fields_are_left_out_of_rows() {
    let dir = test_dir();
    let mut config = config_in(dir.path(), "sparse");
    config.columns = Some(vec![
        Column::new("id", CacheType::Int),
        Column::new("name", CacheType::String),
        Column::new("note", CacheType::String),
    ]);
    let cache = Cache::open_with(config).unwrap();
    cache.add(person(1, "a")).unwrap();
    cache
        .add(person(1, "b").with("note", Value::Null))
        .unwrap();
    cache.add(person(1, "c").with("note", "hi")).unwrap();

    let rows = cache.lookup(1).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].len(), 2);
    assert!(rows[1].get("note").is_none());
    assert_eq!(rows[2].get("note"), Some(&Value::from("hi")));
}

#[test]
fn test_multi_valued_fields_come_back_as_lists() {
    let dir = test_dir();
    let mut config = config_in(dir.path(), "lists");
    config.columns = Some(vec![
        Column::new("id", CacheType::Int),
        Column::new("tags", CacheType::String),
    ]);
    let cache = Cache::open_with(config).unwrap();
    cache
        .add(Record::new().with("id", 1).with("tags", vec!["x", "y"]))
        .unwrap();
    cache
        .add(Record::new().with("id", 1).with("tags", vec!["z"]))
        .unwrap();

    let rows = cache.lookup(1).unwrap();
    assert_eq!(rows[0].get("tags"), Some(&Value::from(vec!["x", "y"])));
    assert_eq!(rows[1].get("tags"), Some(&Value::from("z")));
}

#[test]
fn test_continuation_framing_is_kept_across_sessions() {
    let dir = test_dir();
    let mut config = people_config(dir.path(), "framed");
    config.framing = TupleFraming::Continuation;
    let mut cache = Cache::open_with(config).unwrap();
    cache.add(person(1, "a")).unwrap();
    cache.add(person(1, "b")).unwrap();
    cache.close().unwrap();

    // Reopened with the default framing; the persisted one wins.
    let cache = Cache::open_with(people_config(dir.path(), "framed")).unwrap();
    cache.add(person(1, "c")).unwrap();
    assert_eq!(names(&cache.lookup(1).unwrap()), vec!["a", "b", "c"]);
}

#[test]
fn test_scan_from_another_thread_fails_without_transactions() {
    let dir = test_dir();
    let cache = Cache::open_with(people_config(dir.path(), "affinity")).unwrap();
    cache.add(person(1, "a")).unwrap();

    let mut iter = cache.iter().unwrap();
    let results = thread::spawn(move || {
        let first = iter.next();
        let second = iter.next();
        (first, second)
    })
    .join()
    .unwrap();

    assert!(matches!(
        results.0,
        Some(Err(CacheError::Engine(EngineError::ThreadAffinity { .. })))
    ));
    assert!(results.1.is_none());
}

#[test]
fn test_transactional_scans_run_concurrently() {
    let dir = test_dir();
    let mut config = people_config(dir.path(), "concurrent");
    config.transactional = true;
    let cache = Cache::open_with(config).unwrap();
    for id in 0..50 {
        cache.add(person(id, &format!("p{id}"))).unwrap();
    }

    thread::scope(|s| {
        let handles: Vec<_> = (0..4).map(|_| s.spawn(|| scan_all(&cache).len())).collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 50);
        }
    });
}

#[test]
fn test_closing_the_cache_ends_open_scans() {
    let dir = test_dir();
    let mut cache = Cache::open_with(people_config(dir.path(), "interrupted")).unwrap();
    cache.add(person(1, "a")).unwrap();
    cache.add(person(2, "b")).unwrap();

    let mut iter = cache.iter().unwrap();
    assert!(matches!(iter.next(), Some(Ok(_))));
    cache.close().unwrap();

    assert!(matches!(
        iter.next(),
        Some(Err(CacheError::State(StateError::NotOpen)))
    ));
    assert!(iter.next().is_none());
}

#[test]
fn test_scan_sees_rows_added_before_it_started() {
    let dir = test_dir();
    let cache = Cache::open_with(people_config(dir.path(), "progressive")).unwrap();
    cache.add(person(1, "a")).unwrap();
    let before = scan_all(&cache);
    cache.add(person(2, "b")).unwrap();
    let after = scan_all(&cache);
    assert_eq!(before.len(), 1);
    assert_eq!(after.len(), 2);
}

#[test]
fn test_lookup_reports_the_stored_key() {
    let dir = test_dir();
    let mut config = config_in(dir.path(), "text-keys");
    config.columns = Some(vec![
        Column::new("id", CacheType::String),
        Column::new("name", CacheType::String),
    ]);
    let cache = Cache::open_with(config).unwrap();
    cache.add(person(5, "a")).unwrap();
    cache.add(person(5, "b")).unwrap();

    let scanned = scan_all(&cache);
    assert_eq!(scanned[0].get("id"), Some(&Value::from("5")));
    assert_eq!(cache.lookup(5).unwrap(), scanned);
    assert_eq!(cache.lookup("5").unwrap(), scanned);
    assert_eq!(cache.lookup(vec![5, 6]).unwrap(), scanned);
}
