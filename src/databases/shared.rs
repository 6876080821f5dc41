//! Process-wide registry of engine handles shared by several caches.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use crate::error::CacheResult;

/// Hands out one engine instance per path. Entries are weak, so the engine
/// closes once the last cache holding it drops its handle.
pub(crate) struct SharedHandles<T> {
    handles: Mutex<HashMap<PathBuf, Weak<T>>>,
}

impl<T> Default for SharedHandles<T> {
    fn default() -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> SharedHandles<T> {
    pub(crate) fn get_or_open(
        &self,
        path: &Path,
        open: impl FnOnce() -> CacheResult<T>,
    ) -> CacheResult<Arc<T>> {
        let mut handles = self.handles.lock();
        if let Some(existing) = handles.get(path).and_then(Weak::upgrade) {
            return Ok(existing);
        }
        let handle = Arc::new(open()?);
        handles.retain(|_, weak| weak.strong_count() > 0);
        handles.insert(path.to_path_buf(), Arc::downgrade(&handle));
        Ok(handle)
    }

    pub(crate) fn get(&self, path: &Path) -> Option<Arc<T>> {
        self.handles.lock().get(path).and_then(Weak::upgrade)
    }
}
