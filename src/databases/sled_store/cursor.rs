//! Cursor over one sled tree.

use crate::error::CacheResult;
use crate::traits::EngineCursor;

pub struct SledCursor {
    inner: Option<sled::Iter>,
}

impl SledCursor {
    pub(crate) fn new(inner: sled::Iter) -> Self {
        Self { inner: Some(inner) }
    }
}

impl EngineCursor for SledCursor {
    fn next_entry(&mut self) -> CacheResult<Option<(Vec<u8>, Vec<u8>)>> {
        let Some(inner) = self.inner.as_mut() else {
            return Ok(None);
        };
        match inner.next() {
            Some(entry) => {
                let (key, value) = entry?;
                Ok(Some((key.to_vec(), value.to_vec())))
            }
            None => {
                self.inner = None;
                Ok(None)
            }
        }
    }

    fn close(&mut self) -> CacheResult<()> {
        self.inner = None;
        Ok(())
    }
}
