//! # Multimap Cache
//!
//! A persistent keyed multimap used to stage relational rows on disk during a
//! bulk import, so later stages can join child rows against a parent key
//! without going back to the source system.
//!
//! ## Features
//!
//! - **Durable Schema**: column names and types are remembered beside the data
//!   and win over later configuration
//! - **Compact Tuples**: typed, fixed-layout binary encoding with multi-valued
//!   fields and nulls
//! - **Duplicate Keys**: several rows per key, with three dedup policies for
//!   incremental reloads
//! - **Scans and Lookups**: ordered full scans, optionally snapshot isolated,
//!   plus point and multi-key lookups
//! - **Pluggable Engines**: `redb` and `sled` backends behind cargo features
//! - **Partitioning**: hash routing across several caches, with a matching
//!   join reader
//!
//! ## Quick Start
//!
//! ```rust
//! use multimap_cache::prelude::*;
//!
//! let dir = tempfile::tempdir()?;
//! let config = CacheConfig::builder()
//!     .base_directory(dir.path())
//!     .cache_name("orders")
//!     .columns(vec![
//!         Column::new("order_id", CacheType::Long),
//!         Column::new("item", CacheType::String),
//!     ])
//!     .build();
//!
//! let mut cache = Cache::open_with(config)?;
//! cache.add(Record::new().with("order_id", 7i64).with("item", "bolt"))?;
//! cache.add(Record::new().with("order_id", 7i64).with("item", "nut"))?;
//!
//! for row in cache.iter()? {
//!     let row = row?;
//!     assert_eq!(row.get("order_id"), Some(&Value::Long(7)));
//! }
//! cache.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod databases;
pub mod error;
pub mod iterator;
pub mod join;
pub mod partition;
pub mod prelude;
pub mod schema;
pub mod store;
pub mod tracker;
pub mod traits;
pub mod value;

pub use cache::Cache;
pub use config::{CacheBudget, CacheConfig, DedupPolicy, EvictionPolicy};
pub use databases::BackendKind;
pub use error::{CacheError, CacheResult, EncodingError, EngineError, SchemaError, StateError};
pub use iterator::CacheIter;
pub use join::JoinReader;
pub use partition::PartitionedWriter;
pub use schema::{CacheType, Column, Schema};
pub use value::{Record, Value};
