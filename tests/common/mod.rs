// Common test utilities and helpers
#![allow(dead_code)]

use multimap_cache::prelude::*;
use std::path::Path;
use tempfile::TempDir;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Fresh directory for one test, with logging enabled.
pub fn test_dir() -> TempDir {
    init_logging();
    tempfile::tempdir().expect("create temp dir")
}

/// Small-budget configuration for cache `name` under `dir`.
pub fn config_in(dir: &Path, name: &str) -> CacheConfig {
    CacheConfig::builder()
        .base_directory(dir)
        .cache_name(name)
        .cache_budget(CacheBudget::Bytes(4 * 1024 * 1024))
        .build()
}

pub fn id_name_columns() -> Vec<Column> {
    vec![
        Column::new("id", CacheType::Int),
        Column::new("name", CacheType::String),
    ]
}

/// `config_in` with the `{id: INTEGER, name: STRING}` schema.
pub fn people_config(dir: &Path, name: &str) -> CacheConfig {
    let mut config = config_in(dir, name);
    config.columns = Some(id_name_columns());
    config
}

pub fn person(id: i32, name: &str) -> Record {
    Record::new().with("id", id).with("name", name)
}

/// The `name` field of every row, in order.
pub fn names(rows: &[Record]) -> Vec<String> {
    rows.iter()
        .map(|row| match row.get("name") {
            Some(Value::String(name)) => name.clone(),
            other => panic!("row without a name: {other:?}"),
        })
        .collect()
}

pub fn scan_all(cache: &Cache) -> Vec<Record> {
    cache
        .iter()
        .expect("open scan")
        .collect::<CacheResult<Vec<_>>>()
        .expect("scan rows")
}
