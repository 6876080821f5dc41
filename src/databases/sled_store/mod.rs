//! [sled](https://docs.rs/sled) backend.
//!
//! Each cache is one tree named after the cache, inside `<base>/<name>/sled`
//! or, for shared caches, `<base>/shared.sled`. Transactional mode flushes
//! after every write. Cursors are not snapshot isolated.

mod cursor;

pub use cursor::SledCursor;

use log::debug;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use super::EngineOptions;
use super::shared::SharedHandles;
use crate::error::CacheResult;
use crate::traits::{EngineCursor, StorageEngine};

static SHARED: LazyLock<SharedHandles<sled::Db>> = LazyLock::new(SharedHandles::default);

fn database_path(options: &EngineOptions) -> PathBuf {
    if options.shared {
        options.base_dir.join("shared.sled")
    } else {
        options.data_dir().join("sled")
    }
}

fn open_database(options: &EngineOptions) -> CacheResult<sled::Db> {
    debug!(
        "sled manages page eviction itself; ignoring eviction policy {}",
        options.eviction
    );
    let db = sled::Config::new()
        .path(database_path(options))
        .cache_capacity(options.cache_bytes)
        .open()?;
    Ok(db)
}

pub struct SledEngine {
    // Keeps a shared database registered while this cache uses it.
    _db: Arc<sled::Db>,
    tree: sled::Tree,
    name: String,
    transactional: bool,
}

impl SledEngine {
    pub fn open(options: &EngineOptions) -> CacheResult<Self> {
        let db = if options.shared {
            SHARED.get_or_open(&database_path(options), || open_database(options))?
        } else {
            Arc::new(open_database(options)?)
        };
        let tree = db.open_tree(options.name.as_bytes())?;
        Ok(Self {
            _db: db,
            tree,
            name: options.name.clone(),
            transactional: options.transactional,
        })
    }

    pub(crate) fn drop_shared_tree(options: &EngineOptions) -> CacheResult<()> {
        let path = database_path(options);
        if !path.exists() && SHARED.get(&path).is_none() {
            return Ok(());
        }
        let db = SHARED.get_or_open(&path, || open_database(options))?;
        let dropped = db.drop_tree(options.name.as_bytes())?;
        db.flush()?;
        debug!("Dropped shared tree '{}': {dropped}", options.name);
        Ok(())
    }

    fn after_write(&self) -> CacheResult<()> {
        if self.transactional {
            self.tree.flush()?;
        }
        Ok(())
    }
}

impl StorageEngine for SledEngine {
    fn get(&self, key: &[u8]) -> CacheResult<Option<Vec<u8>>> {
        Ok(self.tree.get(key)?.map(|v| v.to_vec()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> CacheResult<()> {
        self.tree.insert(key, value)?;
        self.after_write()
    }

    fn delete(&self, key: &[u8]) -> CacheResult<()> {
        self.tree.remove(key)?;
        self.after_write()
    }

    fn cursor(&self) -> CacheResult<Box<dyn EngineCursor>> {
        Ok(Box::new(SledCursor::new(self.tree.iter())))
    }

    fn sync(&self) -> CacheResult<()> {
        self.tree.flush()?;
        Ok(())
    }

    fn close(self: Box<Self>) -> CacheResult<()> {
        debug!("Releasing sled handle for '{}'", self.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvictionPolicy;

    fn options(base: &std::path::Path, name: &str, shared: bool) -> EngineOptions {
        EngineOptions {
            base_dir: base.to_path_buf(),
            name: name.to_string(),
            read_only: false,
            transactional: true,
            shared,
            cache_bytes: 1 << 20,
            eviction: EvictionPolicy::Default,
        }
    }

    #[test]
    fn test_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SledEngine::open(&options(dir.path(), "c", false)).unwrap();
        engine.put(b"a", b"1").unwrap();
        engine.put(b"a", b"2").unwrap();
        assert_eq!(engine.get(b"a").unwrap(), Some(b"2".to_vec()));
        engine.delete(b"a").unwrap();
        assert_eq!(engine.get(b"a").unwrap(), None);
    }

    #[test]
    fn test_cursor_is_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SledEngine::open(&options(dir.path(), "c", false)).unwrap();
        for key in [b"c", b"a", b"b"] {
            engine.put(key, b"x").unwrap();
        }
        let mut cursor = engine.cursor().unwrap();
        let mut keys = Vec::new();
        while let Some((k, _)) = cursor.next_entry().unwrap() {
            keys.push(k);
        }
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        cursor.close().unwrap();
        assert!(cursor.next_entry().unwrap().is_none());
    }

    #[test]
    fn test_shared_trees_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let a = SledEngine::open(&options(dir.path(), "a", true)).unwrap();
        let b = SledEngine::open(&options(dir.path(), "b", true)).unwrap();
        a.put(b"k", b"1").unwrap();
        assert_eq!(b.get(b"k").unwrap(), None);

        SledEngine::drop_shared_tree(&options(dir.path(), "b", true)).unwrap();
        assert_eq!(a.get(b"k").unwrap(), Some(b"1".to_vec()));
    }
}
