//! Embedded engine backends and the registry that selects between them.
//!
//! Each backend is behind its own cargo feature. Selecting a backend that was
//! not compiled in is a configuration error at open time.

#[cfg(feature = "redb")]
pub mod redb_store;
pub(crate) mod shared;
#[cfg(feature = "sled")]
pub mod sled_store;

use log::debug;
use std::fs;
use std::path::PathBuf;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::config::EvictionPolicy;
use crate::error::{CacheError, CacheResult};
use crate::traits::StorageEngine;

/// Everything a backend needs to open (or purge) one cache.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub base_dir: PathBuf,
    pub name: String,
    pub read_only: bool,
    pub transactional: bool,
    pub shared: bool,
    /// Internal page cache size in bytes.
    pub cache_bytes: u64,
    pub eviction: EvictionPolicy,
}

impl EngineOptions {
    /// Directory owned by this cache. Unused by shared engines, which live
    /// directly under the base directory.
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join(&self.name)
    }

    /// Directory that must exist before the engine is opened.
    pub fn engine_dir(&self) -> PathBuf {
        if self.shared {
            self.base_dir.clone()
        } else {
            self.data_dir()
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumString, Display, IntoStaticStr, EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BackendKind {
    #[default]
    Redb,
    Sled,
}

impl BackendKind {
    pub fn is_available(self) -> bool {
        match self {
            BackendKind::Redb => cfg!(feature = "redb"),
            BackendKind::Sled => cfg!(feature = "sled"),
        }
    }

    fn unavailable(self) -> CacheError {
        CacheError::config(format!(
            "The {self} backend is not compiled in; enable the '{self}' feature"
        ))
    }

    pub fn open(self, options: &EngineOptions) -> CacheResult<Box<dyn StorageEngine>> {
        let dir = options.engine_dir();
        fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;
        debug!(
            "Opening {self} engine for '{}' (cache {} bytes, eviction {}, shared {}, transactional {})",
            options.name,
            options.cache_bytes,
            options.eviction,
            options.shared,
            options.transactional
        );
        match self {
            #[cfg(feature = "redb")]
            BackendKind::Redb => Ok(Box::new(redb_store::RedbEngine::open(options)?)),
            #[cfg(feature = "sled")]
            BackendKind::Sled => Ok(Box::new(sled_store::SledEngine::open(options)?)),
            #[allow(unreachable_patterns)]
            other => Err(other.unavailable()),
        }
    }

    /// Removes every entry of one cache from disk. Failing to delete files is
    /// an error.
    pub fn purge(self, options: &EngineOptions) -> CacheResult<()> {
        if options.shared {
            return match self {
                #[cfg(feature = "redb")]
                BackendKind::Redb => redb_store::RedbEngine::drop_shared_table(options),
                #[cfg(feature = "sled")]
                BackendKind::Sled => sled_store::SledEngine::drop_shared_tree(options),
                #[allow(unreachable_patterns)]
                other => Err(other.unavailable()),
            };
        }
        let dir = options.data_dir();
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;
        }
        Ok(())
    }
}
