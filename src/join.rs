//! Read-side access used when joining child rows to a parent key.

use std::vec;

use crate::cache::{Cache, default_cache_name};
use crate::config::CacheConfig;
use crate::error::CacheResult;
use crate::iterator::CacheIter;
use crate::partition::partition_name;
use crate::value::{Record, Value};

/// Reads a cache written earlier in the pipeline, either as a full scan or
/// keyed by a parent value.
///
/// The cache is always opened read-only and never purged. Rows for the most
/// recent parent key are held until they are exhausted or the key changes.
pub struct JoinReader {
    cache: Cache,
    scan: Option<CacheIter>,
    parent: Option<Value>,
    joined: Option<vec::IntoIter<Record>>,
}

impl JoinReader {
    /// Opens the cache named in `config`, or partition `n` of it.
    pub fn open(mut config: CacheConfig, partition: Option<usize>) -> CacheResult<Self> {
        config.read_only = true;
        config.delete_prior_data = false;
        if let Some(n) = partition {
            let name = config.cache_name.take().unwrap_or_else(default_cache_name);
            config.cache_name = Some(partition_name(&name, n));
        }
        Ok(Self {
            cache: Cache::open_with(config)?,
            scan: None,
            parent: None,
            joined: None,
        })
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Next row of the full scan, in key order.
    pub fn next_row(&mut self) -> Option<CacheResult<Record>> {
        if self.scan.is_none() {
            match self.cache.iter() {
                Ok(scan) => self.scan = Some(scan),
                Err(e) => return Some(Err(e)),
            }
        }
        self.scan.as_mut().and_then(Iterator::next)
    }

    /// Next row stored under `parent_key`. A new lookup starts whenever the
    /// parent key differs from the previous call. `None` means the rows for
    /// this key are exhausted (or the key is null); the key is then forgotten.
    pub fn next_joined(&mut self, parent_key: impl Into<Value>) -> CacheResult<Option<Record>> {
        let parent_key = parent_key.into();
        if parent_key.is_null() {
            self.reset();
            return Ok(None);
        }
        if self.parent.as_ref() != Some(&parent_key) {
            let rows = self.cache.lookup(parent_key.clone())?;
            self.joined = Some(rows.into_iter());
            self.parent = Some(parent_key);
        }
        match self.joined.as_mut().and_then(Iterator::next) {
            Some(row) => Ok(Some(row)),
            None => {
                self.reset();
                Ok(None)
            }
        }
    }

    fn reset(&mut self) {
        self.parent = None;
        self.joined = None;
    }

    pub fn close(&mut self) -> CacheResult<()> {
        self.scan = None;
        self.reset();
        self.cache.close()
    }
}
