//! Byte-level contract between the multimap store and an embedded engine.

use crate::error::CacheResult;

/// One logical cache inside an embedded key/value engine.
///
/// Keys and values are opaque bytes; `put` replaces any previous value.
/// Entries are ordered by the byte order of their keys.
pub trait StorageEngine: Send + Sync {
    fn get(&self, key: &[u8]) -> CacheResult<Option<Vec<u8>>>;

    fn put(&self, key: &[u8], value: &[u8]) -> CacheResult<()>;

    fn delete(&self, key: &[u8]) -> CacheResult<()>;

    /// Opens an ordered cursor over every entry. In transactional mode the
    /// cursor reads from its own snapshot.
    fn cursor(&self) -> CacheResult<Box<dyn EngineCursor>>;

    /// Makes every write so far durable.
    fn sync(&self) -> CacheResult<()>;

    /// Releases this cache's handle on the engine. A shared engine stays open
    /// until the last cache using it is closed.
    fn close(self: Box<Self>) -> CacheResult<()>;
}

/// Forward-only cursor returned by [`StorageEngine::cursor`].
pub trait EngineCursor: Send {
    fn next_entry(&mut self) -> CacheResult<Option<(Vec<u8>, Vec<u8>)>>;

    /// Ends the cursor and any read transaction behind it. Further calls to
    /// `next_entry` return `None`.
    fn close(&mut self) -> CacheResult<()>;
}
