//! Forward-only scans over a cache.

use log::warn;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::Session;
use crate::codec::KeyCodec;
use crate::error::{CacheResult, StateError};
use crate::traits::EngineCursor;
use crate::value::Record;

/// Engine cursor of one scan, shared with the cache so that closing the cache
/// can close every scan still in flight.
#[derive(Default)]
pub(crate) struct CursorState {
    cursor: Option<Box<dyn EngineCursor>>,
    invalidated: bool,
}

impl CursorState {
    /// Closes the engine cursor and its read transaction.
    pub(crate) fn release(&mut self) {
        if let Some(mut cursor) = self.cursor.take()
            && let Err(e) = cursor.close()
        {
            warn!("Failed to close cache cursor: {e}");
        }
    }

    /// Called when the cache closes under a running scan.
    pub(crate) fn invalidate(&mut self) {
        self.release();
        self.invalidated = true;
    }
}

/// Iterates every row of a cache in key order.
///
/// The engine cursor is opened on the first call to `next`. Each stored entry
/// is expanded into one row per tuple before the cursor moves on, and rows
/// list the key column first. Once the end is reached the cursor and its read
/// transaction are released.
///
/// If the cache is closed while the scan is in progress, the next call yields
/// [`StateError::NotOpen`] and the scan ends.
pub struct CacheIter {
    session: Arc<Session>,
    state: Arc<Mutex<CursorState>>,
    pending: VecDeque<Record>,
    done: bool,
}

impl CacheIter {
    pub(crate) fn new(session: Arc<Session>, state: Arc<Mutex<CursorState>>) -> Self {
        Self {
            session,
            state,
            pending: VecDeque::new(),
            done: false,
        }
    }

    /// Loads the rows of the next stored entry. Returns `false` at the end.
    fn advance(&mut self) -> CacheResult<bool> {
        let mut state = self.state.lock();
        if state.invalidated {
            return Err(StateError::NotOpen.into());
        }
        self.session.check_thread()?;
        let Some(schema) = self.session.schema() else {
            state.release();
            return Ok(false);
        };

        let started = Instant::now();
        let pending = &mut self.pending;
        let result = self.session.with_store(|store| {
            if state.cursor.is_none() {
                state.cursor = Some(store.scan()?);
            }
            let Some(cursor) = state.cursor.as_mut() else {
                return Ok(false);
            };
            match cursor.next_entry()? {
                Some((key, value)) => {
                    let key = KeyCodec::new(schema.key_column()).decode(&key)?;
                    let tuples = store.codec(&schema).decode_list(&value)?;
                    pending.extend(tuples.into_iter().map(|t| t.into_row(&schema, &key)));
                    Ok(true)
                }
                None => {
                    state.release();
                    Ok(false)
                }
            }
        });
        self.session.record_elapsed(started);
        result
    }
}

impl Iterator for CacheIter {
    type Item = CacheResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.state.lock().invalidated {
            self.done = true;
            self.pending.clear();
            return Some(Err(StateError::NotOpen.into()));
        }
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Some(Ok(row));
            }
            match self.advance() {
                Ok(true) => continue,
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    self.state.lock().release();
                    return Some(Err(e));
                }
            }
        }
    }
}
