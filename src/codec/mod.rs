//! Binary codecs for keys and tuples.
//!
//! Everything is written with `bincode` configured for big-endian, fixed-width
//! integers, so every scalar has a fixed byte layout regardless of its value.
//!
//! - `scalar` - one value of a column type, with an optional null flag
//! - `tuple` - the non-key fields of a record and the per-key tuple list
//! - `key` - the primary key, encoded without a null flag

pub mod key;
pub mod scalar;
pub mod tuple;

pub use key::KeyCodec;
pub use tuple::{Tuple, TupleCodec, TupleFraming};

use bincode::config::Config;
use bincode::{Decode, Encode};

use crate::error::{CacheResult, EncodingError};

/// Largest number of elements a list field can hold.
pub const MAX_LIST_LEN: usize = u16::MAX as usize;

pub(crate) fn wire_config() -> impl Config {
    bincode::config::standard()
        .with_big_endian()
        .with_fixed_int_encoding()
}

/// Append-only output buffer.
#[derive(Debug, Default)]
pub struct TupleOutput {
    buf: Vec<u8>,
}

impl TupleOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write<T: Encode>(&mut self, value: &T) -> CacheResult<()> {
        bincode::encode_into_std_write(value, &mut self.buf, wire_config())
            .map_err(EncodingError::from)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Forward-only reader over an encoded entry.
#[derive(Debug)]
pub struct TupleInput<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> TupleInput<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn read<T: Decode<()>>(&mut self) -> CacheResult<T> {
        let (value, read) = bincode::decode_from_slice::<T, _>(&self.buf[self.pos..], wire_config())
            .map_err(EncodingError::from)?;
        self.pos += read;
        Ok(value)
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}
