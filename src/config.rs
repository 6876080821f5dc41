//! Cache configuration.
//!
//! [`CacheConfig`] is built either through its typed builder or from the
//! string options an import pipeline passes around (see [`options`]).

use log::debug;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use sysinfo::System;
use typed_builder::TypedBuilder;

use crate::codec::TupleFraming;
use crate::databases::{BackendKind, EngineOptions};
use crate::error::{CacheError, CacheResult};
use crate::schema::{Column, parse_columns};

/// Option names accepted by [`CacheConfig::from_options`].
pub mod options {
    pub const BASE_DIRECTORY: &str = "base-directory";
    pub const CACHE_NAME: &str = "cache-name";
    pub const DELETE_PRIOR_DATA: &str = "delete-prior-data";
    pub const READ_ONLY: &str = "read-only";
    pub const TRANSACTIONAL: &str = "transactional";
    pub const NO_DUPLICATE_KEYS: &str = "no-duplicate-keys";
    pub const ADDS_ARRIVE_IN_KEY_ORDER: &str = "adds-arrive-in-key-order";
    pub const REMEMBER_CHANGED_KEYS: &str = "remember-changed-keys";
    pub const FIELD_NAMES: &str = "field-names";
    pub const FIELD_TYPES: &str = "field-types";
    pub const PRIMARY_KEY: &str = "primary-key";
    pub const EVICTION_POLICY: &str = "eviction-policy";
    pub const SHARED_ENGINE: &str = "shared-engine";
    pub const INTERNAL_CACHE_SIZE: &str = "internal-cache-size";
    pub const BACKEND: &str = "backend";
    pub const TUPLE_FRAMING: &str = "tuple-framing";
}

/// How repeated adds for one key are treated within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupPolicy {
    /// Every add appends to the key's entry.
    #[default]
    Accumulate,
    /// Every add replaces the key's entry.
    NoDuplicateKeys,
    /// The first add of a key in this session replaces its entry, later adds
    /// append. With `sorted_arrival` only the most recent key is remembered,
    /// which is correct only when adds arrive in key order.
    RememberedKeys { sorted_arrival: bool },
}

impl DedupPolicy {
    /// `no_duplicate_keys` wins over `remember_changed_keys`; arrival order
    /// only matters when keys are remembered.
    pub fn from_flags(no_duplicate_keys: bool, remember_changed_keys: bool, in_key_order: bool) -> Self {
        if no_duplicate_keys {
            DedupPolicy::NoDuplicateKeys
        } else if remember_changed_keys {
            DedupPolicy::RememberedKeys {
                sorted_arrival: in_key_order,
            }
        } else {
            DedupPolicy::Accumulate
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display, IntoStaticStr, EnumIter,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum EvictionPolicy {
    #[default]
    Default,
    EvictLeaf,
    EvictInternal,
}

/// Size of the engine's internal page cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBudget {
    Bytes(u64),
    PercentOfMemory(u8),
}

impl Default for CacheBudget {
    fn default() -> Self {
        CacheBudget::PercentOfMemory(2)
    }
}

impl CacheBudget {
    const FALLBACK_BYTES: u64 = 64 * 1024 * 1024;

    pub fn resolve(self) -> u64 {
        match self {
            CacheBudget::Bytes(bytes) => bytes,
            CacheBudget::PercentOfMemory(percent) => {
                let mut system = System::new();
                system.refresh_memory();
                let total = system.total_memory();
                if total == 0 {
                    debug!("Total memory unknown; using a {} byte cache", Self::FALLBACK_BYTES);
                    return Self::FALLBACK_BYTES;
                }
                total / 100 * u64::from(percent.min(100))
            }
        }
    }
}

/// Configuration for one cache.
///
/// # Examples
///
/// ```
/// use multimap_cache::config::{CacheConfig, DedupPolicy};
///
/// let config = CacheConfig::builder()
///     .base_directory("/tmp/import")
///     .cache_name("orders")
///     .dedup(DedupPolicy::NoDuplicateKeys)
///     .build();
/// assert!(!config.read_only);
/// ```
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
#[builder(doc)]
pub struct CacheConfig {
    /// Directory holding the data directory and properties file; the process
    /// temp directory when unset.
    #[builder(default, setter(strip_option, into))]
    pub base_directory: Option<PathBuf>,

    /// Cache name; a timestamped name when unset.
    #[builder(default, setter(strip_option, into))]
    pub cache_name: Option<String>,

    /// Destroy any existing data and properties file before opening.
    #[builder(default = false)]
    pub delete_prior_data: bool,

    #[builder(default = false)]
    pub read_only: bool,

    /// Durable auto-committed writes and per-cursor read transactions.
    #[builder(default = false)]
    pub transactional: bool,

    #[builder(default)]
    pub dedup: DedupPolicy,

    #[builder(default)]
    pub eviction: EvictionPolicy,

    /// Share one engine between every cache under the base directory.
    #[builder(default = false)]
    pub shared_engine: bool,

    #[builder(default)]
    pub cache_budget: CacheBudget,

    /// Explicit columns, used when nothing is persisted yet.
    #[builder(default, setter(strip_option))]
    pub columns: Option<Vec<Column>>,

    #[builder(default, setter(strip_option, into))]
    pub primary_key: Option<String>,

    #[builder(default)]
    pub backend: BackendKind,

    /// Framing for caches created by this configuration. Existing caches keep
    /// the framing recorded in their properties file.
    #[builder(default)]
    pub framing: TupleFraming,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

fn flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn parse_option<T: FromStr>(name: &str, value: &str) -> CacheResult<T> {
    T::from_str(value.trim())
        .map_err(|_| CacheError::config(format!("Invalid value '{value}' for option {name}")))
}

impl CacheConfig {
    /// Builds a configuration from string options. Unknown option names are
    /// ignored; booleans are true only for a case-insensitive `"true"`.
    pub fn from_options<I, K, V>(pairs: I) -> CacheResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let map: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();
        let get = |name: &str| map.get(name).map(String::as_str);
        let is_set = |name: &str| get(name).is_some_and(flag);

        let columns = match (get(options::FIELD_NAMES), get(options::FIELD_TYPES)) {
            (Some(names), Some(types)) => Some(parse_columns(names, types)?),
            (None, None) => None,
            _ => {
                return Err(CacheError::config(format!(
                    "{} and {} must be given together",
                    options::FIELD_NAMES,
                    options::FIELD_TYPES
                )));
            }
        };

        let cache_budget = match get(options::INTERNAL_CACHE_SIZE) {
            Some(bytes) => CacheBudget::Bytes(parse_option(options::INTERNAL_CACHE_SIZE, bytes)?),
            None => CacheBudget::default(),
        };

        Ok(Self {
            base_directory: get(options::BASE_DIRECTORY).map(PathBuf::from),
            cache_name: get(options::CACHE_NAME).map(str::to_string),
            delete_prior_data: is_set(options::DELETE_PRIOR_DATA),
            read_only: is_set(options::READ_ONLY),
            transactional: is_set(options::TRANSACTIONAL),
            dedup: DedupPolicy::from_flags(
                is_set(options::NO_DUPLICATE_KEYS),
                is_set(options::REMEMBER_CHANGED_KEYS),
                is_set(options::ADDS_ARRIVE_IN_KEY_ORDER),
            ),
            eviction: get(options::EVICTION_POLICY)
                .map(|v| parse_option(options::EVICTION_POLICY, v))
                .transpose()?
                .unwrap_or_default(),
            shared_engine: is_set(options::SHARED_ENGINE),
            cache_budget,
            columns,
            primary_key: get(options::PRIMARY_KEY).map(str::to_string),
            backend: get(options::BACKEND)
                .map(|v| parse_option(options::BACKEND, v))
                .transpose()?
                .unwrap_or_default(),
            framing: get(options::TUPLE_FRAMING)
                .map(|v| parse_option(options::TUPLE_FRAMING, v))
                .transpose()?
                .unwrap_or_default(),
        })
    }

    pub(crate) fn engine_options(&self, base_dir: PathBuf, name: String) -> EngineOptions {
        EngineOptions {
            base_dir,
            name,
            read_only: self.read_only,
            transactional: self.transactional,
            shared: self.shared_engine,
            cache_bytes: self.cache_budget.resolve(),
            eviction: self.eviction,
        }
    }
}
