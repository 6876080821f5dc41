//! [redb](https://docs.rs/redb) backend.
//!
//! Each cache is one table named after the cache. A private cache keeps its
//! table in `<base>/<name>/data.redb`; shared caches all use
//! `<base>/shared.redb`.
//!
//! In transactional mode every write commits with immediate durability. In
//! non-transactional mode writes commit without durability and only become
//! durable on [`StorageEngine::sync`].

mod cursor;

pub use cursor::RedbCursor;

use log::debug;
use redb::{Database, Durability, ReadableDatabase, Table, TableDefinition, TableError};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use super::EngineOptions;
use super::shared::SharedHandles;
use crate::error::CacheResult;
use crate::traits::{EngineCursor, StorageEngine};

pub(crate) type Bytes = &'static [u8];

static SHARED: LazyLock<SharedHandles<Database>> = LazyLock::new(SharedHandles::default);

pub(crate) fn table_def(name: &str) -> TableDefinition<'_, Bytes, Bytes> {
    TableDefinition::new(name)
}

fn database_path(options: &EngineOptions) -> PathBuf {
    if options.shared {
        options.base_dir.join("shared.redb")
    } else {
        options.data_dir().join("data.redb")
    }
}

/// Budgets beyond the address space saturate.
fn cache_size(bytes: u64) -> usize {
    usize::try_from(bytes).unwrap_or(usize::MAX)
}

fn open_database(path: &Path, options: &EngineOptions) -> CacheResult<Database> {
    debug!(
        "redb manages page eviction itself; ignoring eviction policy {}",
        options.eviction
    );
    let mut builder = redb::Builder::new();
    builder.set_cache_size(cache_size(options.cache_bytes));
    let db = if options.read_only {
        builder.open(path)?
    } else {
        builder.create(path)?
    };
    Ok(db)
}

pub struct RedbEngine {
    db: Arc<Database>,
    table: String,
    transactional: bool,
}

impl RedbEngine {
    pub fn open(options: &EngineOptions) -> CacheResult<Self> {
        let path = database_path(options);
        let db = if options.shared {
            SHARED.get_or_open(&path, || open_database(&path, options))?
        } else {
            Arc::new(open_database(&path, options)?)
        };
        let engine = Self {
            db,
            table: options.name.clone(),
            transactional: options.transactional,
        };
        if !options.read_only {
            engine.write(|_| Ok(()))?;
        }
        Ok(engine)
    }

    /// Drops one cache's table from the shared database.
    pub(crate) fn drop_shared_table(options: &EngineOptions) -> CacheResult<()> {
        let path = database_path(options);
        if !path.exists() && SHARED.get(&path).is_none() {
            return Ok(());
        }
        let db = SHARED.get_or_open(&path, || open_database(&path, options))?;
        let txn = db.begin_write()?;
        let dropped = txn.delete_table(table_def(&options.name))?;
        txn.commit()?;
        debug!("Dropped shared table '{}': {dropped}", options.name);
        Ok(())
    }

    fn write<F>(&self, f: F) -> CacheResult<()>
    where
        F: FnOnce(&mut Table<'_, Bytes, Bytes>) -> CacheResult<()>,
    {
        let mut txn = self.db.begin_write()?;
        if !self.transactional {
            txn.set_durability(Durability::None)?;
        }
        {
            let mut table = txn.open_table(table_def(&self.table))?;
            f(&mut table)?;
        }
        txn.commit()?;
        Ok(())
    }
}

impl StorageEngine for RedbEngine {
    fn get(&self, key: &[u8]) -> CacheResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(table_def(&self.table)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(table.get(key)?.map(|v| v.value().to_vec()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> CacheResult<()> {
        self.write(|table| {
            table.insert(key, value)?;
            Ok(())
        })
    }

    fn delete(&self, key: &[u8]) -> CacheResult<()> {
        self.write(|table| {
            table.remove(key)?;
            Ok(())
        })
    }

    fn cursor(&self) -> CacheResult<Box<dyn EngineCursor>> {
        Ok(Box::new(RedbCursor::open(&self.db, &self.table)?))
    }

    fn sync(&self) -> CacheResult<()> {
        let mut txn = self.db.begin_write()?;
        txn.set_durability(Durability::Immediate)?;
        txn.commit()?;
        Ok(())
    }

    fn close(self: Box<Self>) -> CacheResult<()> {
        debug!("Releasing redb handle for '{}'", self.table);
        Ok(())
    }
}
