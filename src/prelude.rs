//! Prelude module for convenient imports.
//!
//! ```rust
//! use multimap_cache::prelude::*;
//! ```

pub use crate::cache::Cache;
pub use crate::codec::TupleFraming;
pub use crate::config::{CacheBudget, CacheConfig, DedupPolicy, EvictionPolicy};
pub use crate::databases::BackendKind;
pub use crate::error::{CacheError, CacheResult};
pub use crate::iterator::CacheIter;
pub use crate::join::JoinReader;
pub use crate::partition::PartitionedWriter;
pub use crate::schema::{CacheType, Column, Schema};
pub use crate::value::{Record, Value};
