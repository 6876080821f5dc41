//! Writing one logical cache as several partition caches.

use log::warn;
use std::collections::HashMap;
use std::marker::PhantomData;

use crate::cache::{Cache, default_cache_name};
use crate::config::CacheConfig;
use crate::error::CacheResult;
use crate::traits::{FastHash, HashAlgorithm};
use crate::value::{Record, Value};

/// Name of partition `index` of the cache `name`.
pub fn partition_name(name: &str, index: usize) -> String {
    format!("{name}-part{index}")
}

/// Keys whose stored rows are replaced on their next upload.
struct DeltaKeys<H: HashAlgorithm> {
    buckets: HashMap<u64, Vec<Value>>,
    _hash: PhantomData<H>,
}

impl<H: HashAlgorithm> Default for DeltaKeys<H> {
    fn default() -> Self {
        Self {
            buckets: HashMap::new(),
            _hash: PhantomData,
        }
    }
}

impl<H: HashAlgorithm> DeltaKeys<H> {
    fn insert(&mut self, key: Value) {
        let bucket = self.buckets.entry(H::hash_value(&key)).or_default();
        if !bucket.contains(&key) {
            bucket.push(key);
        }
    }

    fn remove(&mut self, key: &Value) -> bool {
        let hash = H::hash_value(key);
        let Some(bucket) = self.buckets.get_mut(&hash) else {
            return false;
        };
        let Some(pos) = bucket.iter().position(|k| k == key) else {
            return false;
        };
        bucket.swap_remove(pos);
        if bucket.is_empty() {
            self.buckets.remove(&hash);
        }
        true
    }

    fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }
}

fn first_value(value: &Value) -> Value {
    match value {
        Value::List(items) => items.first().cloned().unwrap_or_default(),
        other => other.clone(),
    }
}

/// Routes records across `N` caches by the hash of their primary key.
///
/// With a single partition the cache keeps its configured name; otherwise
/// partition `i` is named `<name>-part<i>`.
pub struct PartitionedWriter<H: HashAlgorithm = FastHash> {
    partitions: Vec<Cache>,
    primary_key: Option<String>,
    delta: DeltaKeys<H>,
}

impl PartitionedWriter<FastHash> {
    pub fn open(config: CacheConfig, partitions: usize) -> CacheResult<Self> {
        Self::open_with_hasher(config, partitions)
    }
}

impl<H: HashAlgorithm> PartitionedWriter<H> {
    pub fn open_with_hasher(config: CacheConfig, partitions: usize) -> CacheResult<Self> {
        let count = partitions.max(1);
        let name = config.cache_name.clone().unwrap_or_else(default_cache_name);
        let primary_key = config.primary_key.clone();
        let mut opened = Vec::with_capacity(count);
        for i in 0..count {
            let mut partition_config = config.clone();
            partition_config.cache_name = Some(match count {
                1 => name.clone(),
                _ => partition_name(&name, i),
            });
            // Partitions opened so far are closed by their `Drop` on error.
            opened.push(Cache::open_with(partition_config)?);
        }
        Ok(Self {
            partitions: opened,
            primary_key,
            delta: DeltaKeys::default(),
        })
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn partition(&self, index: usize) -> Option<&Cache> {
        self.partitions.get(index)
    }

    pub fn partition_for(&self, key: &Value) -> usize {
        H::partition_for(&first_value(key), self.partitions.len())
    }

    /// Announces keys whose existing rows must be replaced by the rows
    /// uploaded for them next.
    pub fn set_delta_keys<I, K>(&mut self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<Value>,
    {
        for key in keys {
            self.delta.insert(first_value(&key.into()));
        }
    }

    pub fn pending_delta_keys(&self) -> usize {
        self.delta.len()
    }

    /// Adds a record to the partition owning its key. Returns `false`, after
    /// logging a warning, when the record has no key value.
    pub fn upload(&mut self, record: Record) -> CacheResult<bool> {
        let key = match &self.primary_key {
            Some(field) => record.get_ignore_case(field).map(first_value),
            None => record.first().map(|(_, v)| first_value(v)),
        };
        let key = match key {
            Some(key) if !key.is_null() => key,
            _ => {
                warn!(
                    "Unable to upload record without a value for its key field {}",
                    self.primary_key.as_deref().unwrap_or("(first field)")
                );
                return Ok(false);
            }
        };
        let index = H::partition_for(&key, self.partitions.len());
        let partition = &self.partitions[index];
        if self.delta.remove(&key) {
            partition.delete(key)?;
        }
        partition.add(record)?;
        Ok(true)
    }

    pub fn delete(&self, key: impl Into<Value>) -> CacheResult<()> {
        let key = first_value(&key.into());
        self.partitions[self.partition_for(&key)].delete(key)
    }

    pub fn delete_all(&mut self) -> CacheResult<()> {
        for partition in &mut self.partitions {
            partition.delete_all()?;
        }
        Ok(())
    }

    /// Flushes every partition.
    pub fn commit(&self) -> CacheResult<()> {
        for partition in &self.partitions {
            partition.flush()?;
        }
        Ok(())
    }

    pub fn rollback(&self) {
        warn!("Rollback is not supported by the partitioned cache writer");
    }

    /// Closes every partition, reporting the first failure.
    pub fn close(&mut self) -> CacheResult<()> {
        let mut result = Ok(());
        for partition in &mut self.partitions {
            let closed = partition.close();
            if result.is_ok() {
                result = closed;
            }
        }
        result
    }
}
