//! Tuple encoding and the framing of the tuple list stored under one key.
//!
//! Every non-key field is written as a `u16` element count followed by that many
//! scalars; a count of one means a plain scalar, anything else a list. The list
//! of tuples for a key is framed either with a leading `u32` count
//! ([`TupleFraming::Counted`]) or with a boolean after each tuple telling
//! whether another one follows ([`TupleFraming::Continuation`]).

use derive_more::{From, Into};
use log::warn;
use strum::{Display, EnumString};

use super::scalar::{read_scalar, write_scalar};
use super::{MAX_LIST_LEN, TupleInput, TupleOutput};
use crate::error::{CacheResult, EncodingError, SchemaError};
use crate::schema::Schema;
use crate::value::{Record, Value};

/// The non-key values of one added record, in schema order.
#[derive(Debug, Clone, PartialEq, Default, From, Into)]
pub struct Tuple(Vec<Value>);

impl Tuple {
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Splits a record into its key value and its tuple. Fields that are not in
    /// the schema are skipped with a warning; absent fields become nulls.
    pub fn from_record(schema: &Schema, record: Record) -> (Value, Tuple) {
        let mut key = Value::Null;
        let mut values = vec![Value::Null; schema.tuple_width()];
        for (name, value) in record {
            let Some(index) = schema.column_index(&name) else {
                warn!(
                    "Skipped data element: {name} because either it was not specified in the first row of data or not in the configured field names & types"
                );
                continue;
            };
            match schema.tuple_position(index) {
                Some(pos) => values[pos] = value.unwrap_singleton(),
                None => key = value,
            }
        }
        (key, Tuple(values))
    }

    /// Rebuilds a flattened row: the key first, then every non-null field in
    /// schema order.
    pub fn into_row(self, schema: &Schema, key: &Value) -> Record {
        let mut row = Record::with_capacity(schema.len());
        row.insert(schema.key_column().name.clone(), key.clone());
        for (column, value) in schema.value_columns().zip(self.0) {
            if !value.is_null() {
                row.insert(column.name.clone(), value);
            }
        }
        row
    }
}

/// How the tuples stored under a single key are delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum TupleFraming {
    /// A `u32` tuple count precedes the tuples.
    #[default]
    #[strum(serialize = "COUNTED")]
    Counted,
    /// A trailing boolean after each tuple; `false` ends the list.
    #[strum(serialize = "CONTINUATION")]
    Continuation,
}

/// Encodes and decodes tuple lists against one schema.
#[derive(Debug, Clone, Copy)]
pub struct TupleCodec<'a> {
    schema: &'a Schema,
    framing: TupleFraming,
}

impl<'a> TupleCodec<'a> {
    pub fn new(schema: &'a Schema, framing: TupleFraming) -> Self {
        Self { schema, framing }
    }

    pub fn encode_tuple(&self, out: &mut TupleOutput, tuple: &Tuple) -> CacheResult<()> {
        if tuple.len() != self.schema.tuple_width() {
            return Err(SchemaError::FieldCountMismatch {
                expected: self.schema.tuple_width(),
                found: tuple.len(),
            }
            .into());
        }
        for (column, value) in self.schema.value_columns().zip(tuple.values()) {
            match value {
                Value::List(items) => {
                    let mut count = items.len();
                    if count > MAX_LIST_LEN {
                        warn!(
                            "Cannot store all the values of '{}'. Max is: {MAX_LIST_LEN}",
                            column.name
                        );
                        count = MAX_LIST_LEN;
                    }
                    out.write(&(count as u16))?;
                    for item in &items[..count] {
                        write_scalar(out, column, item, true)?;
                    }
                }
                scalar => {
                    out.write(&1u16)?;
                    write_scalar(out, column, scalar, true)?;
                }
            }
        }
        Ok(())
    }

    pub fn decode_tuple(&self, input: &mut TupleInput<'_>) -> CacheResult<Tuple> {
        let mut values = Vec::with_capacity(self.schema.tuple_width());
        for column in self.schema.value_columns() {
            let count: u16 = input.read()?;
            if count == 1 {
                values.push(read_scalar(input, column.ty, true)?);
            } else {
                let mut items = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    items.push(read_scalar(input, column.ty, true)?);
                }
                values.push(Value::List(items));
            }
        }
        Ok(Tuple(values))
    }

    /// Encodes the full list of tuples stored under one key.
    pub fn encode_list(&self, tuples: &[Tuple]) -> CacheResult<Vec<u8>> {
        if tuples.is_empty() {
            return Err(EncodingError::EmptyEntry.into());
        }
        let mut out = TupleOutput::new();
        match self.framing {
            TupleFraming::Counted => {
                out.write(&(tuples.len() as u32))?;
                for tuple in tuples {
                    self.encode_tuple(&mut out, tuple)?;
                }
            }
            TupleFraming::Continuation => {
                for (i, tuple) in tuples.iter().enumerate() {
                    self.encode_tuple(&mut out, tuple)?;
                    out.write(&(i + 1 < tuples.len()))?;
                }
            }
        }
        Ok(out.into_bytes())
    }

    pub fn decode_list(&self, bytes: &[u8]) -> CacheResult<Vec<Tuple>> {
        let mut input = TupleInput::new(bytes);
        let tuples = match self.framing {
            TupleFraming::Counted => {
                let count: u32 = input.read()?;
                if count == 0 {
                    return Err(EncodingError::EmptyEntry.into());
                }
                // Each tuple takes at least one byte, so a corrupt count cannot
                // force a huge allocation.
                let mut tuples = Vec::with_capacity((count as usize).min(input.remaining()));
                for _ in 0..count {
                    tuples.push(self.decode_tuple(&mut input)?);
                }
                tuples
            }
            TupleFraming::Continuation => {
                let mut tuples = Vec::with_capacity(2);
                loop {
                    tuples.push(self.decode_tuple(&mut input)?);
                    if !input.read::<bool>()? {
                        break;
                    }
                }
                tuples
            }
        };
        if input.remaining() > 0 {
            return Err(EncodingError::TrailingBytes(input.remaining()).into());
        }
        Ok(tuples)
    }
}
