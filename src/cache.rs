//! The cache lifecycle: open, add, scan, flush, close and destroy.

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::codec::{KeyCodec, Tuple, TupleFraming};
use crate::config::CacheConfig;
use crate::databases::EngineOptions;
use crate::error::{CacheResult, EngineError, StateError};
use crate::iterator::{CacheIter, CursorState};
use crate::schema::{Schema, SchemaRegistry, infer_columns};
use crate::store::MultimapStore;
use crate::tracker::ChangeTracker;
use crate::value::{Record, Value};

/// State of one open session that scans share with the cache.
pub(crate) struct Session {
    name: String,
    store: RwLock<Option<MultimapStore>>,
    schema: RwLock<Option<Arc<Schema>>>,
    framing: TupleFraming,
    transactional: bool,
    owner: ThreadId,
    elapsed_nanos: AtomicU64,
}

impl Session {
    pub(crate) fn schema(&self) -> Option<Arc<Schema>> {
        self.schema.read().clone()
    }

    pub(crate) fn with_store<R>(
        &self,
        f: impl FnOnce(&MultimapStore) -> CacheResult<R>,
    ) -> CacheResult<R> {
        let guard = self.store.read();
        let store = guard.as_ref().ok_or(StateError::NotOpen)?;
        f(store)
    }

    /// Without transactions, engine cursors may only be driven by the thread
    /// that opened the cache.
    pub(crate) fn check_thread(&self) -> CacheResult<()> {
        if !self.transactional && thread::current().id() != self.owner {
            return Err(EngineError::ThreadAffinity {
                cache: self.name.clone(),
            }
            .into());
        }
        Ok(())
    }

    pub(crate) fn record_elapsed(&self, started: Instant) {
        let nanos = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    fn timed<R>(&self, f: impl FnOnce() -> CacheResult<R>) -> CacheResult<R> {
        let started = Instant::now();
        let result = f();
        self.record_elapsed(started);
        result
    }

    fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::Relaxed))
    }
}

/// Everything that exists only while the cache is open.
struct OpenCache {
    session: Arc<Session>,
    registry: SchemaRegistry,
    primary_key: Option<String>,
    read_only: bool,
    tracker: Mutex<ChangeTracker>,
    cursors: Mutex<Vec<Weak<Mutex<CursorState>>>>,
}

impl OpenCache {
    fn writable(&self) -> CacheResult<()> {
        if self.read_only {
            return Err(StateError::ReadOnly.into());
        }
        Ok(())
    }

    /// The session schema, inferring and persisting it from `record` on the
    /// first add to a cache that has none yet.
    fn schema_for(&self, record: &Record) -> CacheResult<Arc<Schema>> {
        if let Some(schema) = self.session.schema() {
            return Ok(schema);
        }
        let mut slot = self.session.schema.write();
        if let Some(schema) = slot.as_ref() {
            return Ok(schema.clone());
        }
        let columns = infer_columns(record);
        let schema = Arc::new(Schema::new(columns.clone(), self.primary_key.as_deref())?);
        self.registry.persist(&columns, self.session.framing)?;
        *slot = Some(schema.clone());
        Ok(schema)
    }

    fn close_cursors(&self) {
        for cursor in self.cursors.lock().drain(..) {
            if let Some(state) = cursor.upgrade() {
                state.lock().invalidate();
            }
        }
    }
}

pub(crate) fn default_cache_name() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("multimap-cache-{millis}")
}

/// A persistent keyed multimap of records.
///
/// # Examples
///
/// ```
/// use multimap_cache::{Cache, CacheConfig, Record};
///
/// let dir = tempfile::tempdir().unwrap();
/// let mut cache = Cache::new(
///     CacheConfig::builder()
///         .base_directory(dir.path())
///         .cache_name("people")
///         .build(),
/// );
/// cache.open().unwrap();
/// cache.add(Record::new().with("id", 1).with("name", "Ada")).unwrap();
/// cache.add(Record::new().with("id", 1).with("name", "Grace")).unwrap();
///
/// let rows = cache.lookup(1).unwrap();
/// assert_eq!(rows.len(), 2);
/// cache.close().unwrap();
/// ```
pub struct Cache {
    config: CacheConfig,
    base_dir: PathBuf,
    name: String,
    state: Option<OpenCache>,
}

impl Cache {
    /// Creates a closed cache. A missing base directory falls back to the
    /// process temp directory and a missing name to a timestamped one.
    pub fn new(config: CacheConfig) -> Self {
        let base_dir = config
            .base_directory
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let name = config.cache_name.clone().unwrap_or_else(default_cache_name);
        Self {
            config,
            base_dir,
            name,
            state: None,
        }
    }

    /// Creates and opens a cache.
    pub fn open_with(config: CacheConfig) -> CacheResult<Self> {
        let mut cache = Self::new(config);
        cache.open()?;
        Ok(cache)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_dir
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// `<base>/<name>_cache.properties`
    pub fn properties_path(&self) -> PathBuf {
        self.base_dir.join(format!("{}_cache.properties", self.name))
    }

    /// The schema of the open session, if one is known yet.
    pub fn schema(&self) -> Option<Arc<Schema>> {
        self.state.as_ref().and_then(|open| open.session.schema())
    }

    fn engine_options(&self) -> EngineOptions {
        self.config
            .engine_options(self.base_dir.clone(), self.name.clone())
    }

    fn open_state(&self) -> CacheResult<&OpenCache> {
        self.state.as_ref().ok_or_else(|| StateError::NotOpen.into())
    }

    pub fn open(&mut self) -> CacheResult<()> {
        if self.state.is_some() {
            return Err(StateError::AlreadyOpen.into());
        }
        let options = self.engine_options();
        if self.config.delete_prior_data {
            if self.config.read_only {
                warn!(
                    "Ignoring delete-prior-data for read-only cache '{}'",
                    self.name
                );
            } else {
                self.config.backend.purge(&options)?;
                SchemaRegistry::new(self.properties_path()).remove();
            }
        }

        let registry = SchemaRegistry::new(self.properties_path());
        let resolution = registry.resolve(
            self.config.columns.as_deref(),
            self.config.primary_key.as_deref(),
            self.config.read_only,
            self.config.framing,
        )?;
        let engine = self.config.backend.open(&options)?;

        let session = Session {
            name: self.name.clone(),
            store: RwLock::new(Some(MultimapStore::new(engine, resolution.framing))),
            schema: RwLock::new(resolution.schema.map(Arc::new)),
            framing: resolution.framing,
            transactional: self.config.transactional,
            owner: thread::current().id(),
            elapsed_nanos: AtomicU64::new(0),
        };
        info!(
            "Opened cache '{}' in {:?} ({} backend, {:?}, transactional: {}, read-only: {})",
            self.name,
            self.base_dir,
            self.config.backend,
            self.config.dedup,
            self.config.transactional,
            self.config.read_only
        );
        self.state = Some(OpenCache {
            session: Arc::new(session),
            registry,
            primary_key: self.config.primary_key.clone(),
            read_only: self.config.read_only,
            tracker: Mutex::new(ChangeTracker::new(self.config.dedup)),
            cursors: Mutex::new(Vec::new()),
        });
        Ok(())
    }

    /// Adds a record under its primary key, applying the dedup policy.
    pub fn add(&self, record: Record) -> CacheResult<()> {
        let open = self.open_state()?;
        open.writable()?;
        let session = &open.session;
        session.timed(|| {
            let schema = open.schema_for(&record)?;
            let (key, tuple) = Tuple::from_record(&schema, record);
            let key = KeyCodec::new(schema.key_column()).encode(&key)?;

            let mut tracker = open.tracker.lock();
            let replace = tracker.should_replace(&key);
            session.with_store(|store| {
                // `put` replaces the whole entry, so a replacing add starts empty.
                let mut tuples = if replace {
                    Vec::with_capacity(1)
                } else {
                    store.get(&schema, &key)?.unwrap_or_default()
                };
                tuples.push(tuple);
                store.put(&schema, &key, &tuples)
            })?;
            // Only a written key counts as seen.
            tracker.record(&key);
            Ok(())
        })
    }

    /// Removes every tuple stored under `key`.
    pub fn delete(&self, key: impl Into<Value>) -> CacheResult<()> {
        let open = self.open_state()?;
        open.writable()?;
        let Some(schema) = open.session.schema() else {
            return Ok(());
        };
        let key = KeyCodec::new(schema.key_column()).encode(&key.into())?;
        let _tracker = open.tracker.lock();
        open.session.with_store(|store| store.delete(&key))
    }

    /// Makes all writes durable. Does nothing for a read-only cache.
    pub fn flush(&self) -> CacheResult<()> {
        let open = self.open_state()?;
        if open.read_only {
            return Ok(());
        }
        open.session.with_store(MultimapStore::sync)
    }

    /// Scans every row in key order.
    pub fn iter(&self) -> CacheResult<CacheIter> {
        let open = self.open_state()?;
        let state = Arc::new(Mutex::new(CursorState::default()));
        let mut cursors = open.cursors.lock();
        cursors.retain(|c| c.strong_count() > 0);
        cursors.push(Arc::downgrade(&state));
        Ok(CacheIter::new(open.session.clone(), state))
    }

    /// Rows stored under one key, in the order they were added.
    pub fn lookup(&self, key: impl Into<Value>) -> CacheResult<Vec<Record>> {
        self.lookup_all([key])
    }

    /// Rows of several keys, concatenated in the order the keys are given.
    ///
    /// Keys are converted to the key column's type, and rows carry the key as
    /// stored, the same way a scan reports it.
    pub fn lookup_all<I, K>(&self, keys: I) -> CacheResult<Vec<Record>>
    where
        I: IntoIterator<Item = K>,
        K: Into<Value>,
    {
        let open = self.open_state()?;
        let Some(schema) = open.session.schema() else {
            return Ok(Vec::new());
        };
        let codec = KeyCodec::new(schema.key_column());
        open.session.timed(|| {
            open.session.with_store(|store| {
                let mut rows = Vec::new();
                for key in keys {
                    let encoded = codec.encode(&key.into())?;
                    if let Some(tuples) = store.get(&schema, &encoded)? {
                        let key = codec.decode(&encoded)?;
                        rows.extend(tuples.into_iter().map(|t| t.into_row(&schema, &key)));
                    }
                }
                Ok(rows)
            })
        })
    }

    /// Flushes (unless read-only), closes outstanding scans and releases the
    /// engine. Closing a closed cache does nothing.
    pub fn close(&mut self) -> CacheResult<()> {
        let Some(open) = self.state.take() else {
            debug!("Cache '{}' is already closed", self.name);
            return Ok(());
        };
        let flushed = if open.read_only {
            Ok(())
        } else {
            open.session.with_store(MultimapStore::sync)
        };
        open.close_cursors();
        let closed = match open.session.store.write().take() {
            Some(store) => store.close(),
            None => Ok(()),
        };
        info!(
            "Total read/write time for cache '{}' was {} ms",
            self.name,
            open.session.elapsed().as_millis()
        );
        flushed.and(closed)
    }

    /// Closes the cache and deletes its data and its properties file.
    pub fn destroy(&mut self) -> CacheResult<()> {
        self.close()?;
        self.config.backend.purge(&self.engine_options())?;
        SchemaRegistry::new(self.properties_path()).remove();
        info!("Destroyed cache '{}' in {:?}", self.name, self.base_dir);
        Ok(())
    }

    /// Destroys the cache and opens it again, empty, with the same
    /// configuration.
    pub fn delete_all(&mut self) -> CacheResult<()> {
        self.destroy()?;
        self.open()
    }
}

impl Drop for Cache {
    fn drop(&mut self) {
        if self.state.is_some()
            && let Err(e) = self.close()
        {
            warn!("Failed to close cache '{}' on drop: {e}", self.name);
        }
    }
}
