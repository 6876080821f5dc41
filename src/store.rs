//! Typed multimap on top of a byte-level storage engine.

use crate::codec::{Tuple, TupleCodec, TupleFraming};
use crate::error::CacheResult;
use crate::schema::Schema;
use crate::traits::{EngineCursor, StorageEngine};

/// Persistent ordered map from an encoded key to the list of tuples added
/// under it, in insertion order.
pub struct MultimapStore {
    engine: Box<dyn StorageEngine>,
    framing: TupleFraming,
}

impl MultimapStore {
    pub fn new(engine: Box<dyn StorageEngine>, framing: TupleFraming) -> Self {
        Self { engine, framing }
    }

    pub fn framing(&self) -> TupleFraming {
        self.framing
    }

    pub fn codec<'a>(&self, schema: &'a Schema) -> TupleCodec<'a> {
        TupleCodec::new(schema, self.framing)
    }

    pub fn get(&self, schema: &Schema, key: &[u8]) -> CacheResult<Option<Vec<Tuple>>> {
        match self.engine.get(key)? {
            Some(bytes) => Ok(Some(self.codec(schema).decode_list(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Replaces the whole entry for `key`.
    pub fn put(&self, schema: &Schema, key: &[u8], tuples: &[Tuple]) -> CacheResult<()> {
        let bytes = self.codec(schema).encode_list(tuples)?;
        self.engine.put(key, &bytes)
    }

    pub fn delete(&self, key: &[u8]) -> CacheResult<()> {
        self.engine.delete(key)
    }

    /// Raw ordered cursor; entries are decoded with [`MultimapStore::codec`].
    pub fn scan(&self) -> CacheResult<Box<dyn EngineCursor>> {
        self.engine.cursor()
    }

    pub fn sync(&self) -> CacheResult<()> {
        self.engine.sync()
    }

    pub fn close(self) -> CacheResult<()> {
        self.engine.close()
    }
}
