//! Batched, snapshot-reading cursor over one redb table.

use redb::{Database, ReadOnlyTable, ReadTransaction, ReadableDatabase, TableError};
use std::collections::VecDeque;
use std::ops::Bound;

use super::{Bytes, table_def};
use crate::error::CacheResult;
use crate::traits::EngineCursor;

const BATCH: usize = 256;

/// Ordered cursor over one table, reading from its own read transaction.
///
/// Entries are pulled in batches by re-ranging from the last key seen, so the
/// cursor never holds a borrowed range across calls.
pub struct RedbCursor {
    table: Option<ReadOnlyTable<Bytes, Bytes>>,
    txn: Option<ReadTransaction>,
    buffer: VecDeque<(Vec<u8>, Vec<u8>)>,
    last_key: Option<Vec<u8>>,
    exhausted: bool,
}

impl RedbCursor {
    pub(crate) fn open(db: &Database, name: &str) -> CacheResult<Self> {
        let txn = db.begin_read()?;
        let table = match txn.open_table(table_def(name)) {
            Ok(table) => Some(table),
            Err(TableError::TableDoesNotExist(_)) => None,
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            exhausted: table.is_none(),
            table,
            txn: Some(txn),
            buffer: VecDeque::with_capacity(BATCH),
            last_key: None,
        })
    }

    fn refill(&mut self) -> CacheResult<()> {
        let Some(table) = &self.table else {
            self.exhausted = true;
            return Ok(());
        };
        let lower: Bound<&[u8]> = match &self.last_key {
            Some(key) => Bound::Excluded(key.as_slice()),
            None => Bound::Unbounded,
        };
        let upper: Bound<&[u8]> = Bound::Unbounded;
        let mut fetched = 0;
        for entry in table.range::<&[u8]>((lower, upper))?.take(BATCH) {
            let (key, value) = entry?;
            self.buffer
                .push_back((key.value().to_vec(), value.value().to_vec()));
            fetched += 1;
        }
        if fetched < BATCH {
            self.exhausted = true;
        }
        if let Some((key, _)) = self.buffer.back() {
            self.last_key = Some(key.clone());
        }
        Ok(())
    }
}

impl EngineCursor for RedbCursor {
    fn next_entry(&mut self) -> CacheResult<Option<(Vec<u8>, Vec<u8>)>> {
        if self.buffer.is_empty() && !self.exhausted {
            self.refill()?;
        }
        Ok(self.buffer.pop_front())
    }

    fn close(&mut self) -> CacheResult<()> {
        self.buffer.clear();
        self.exhausted = true;
        self.table = None;
        if let Some(txn) = self.txn.take() {
            txn.close()?;
        }
        Ok(())
    }
}
