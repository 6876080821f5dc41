//! Primary-key encoding.
//!
//! Keys use the scalar layout of the key column without a null flag, so their
//! byte order is the order entries are scanned in.

use log::warn;

use super::scalar::{read_scalar, write_scalar};
use super::{TupleInput, TupleOutput};
use crate::error::{CacheResult, EncodingError};
use crate::schema::Column;
use crate::value::Value;

/// Encodes primary-key values for the key column of a schema.
///
/// Keys carry no null flag, so a null key is rejected. When a producer hands
/// over several values for the key field only the first one is kept.
#[derive(Debug, Clone, Copy)]
pub struct KeyCodec<'a> {
    column: &'a Column,
}

impl<'a> KeyCodec<'a> {
    pub fn new(column: &'a Column) -> Self {
        Self { column }
    }

    pub fn encode(&self, key: &Value) -> CacheResult<Vec<u8>> {
        let key = match key {
            Value::List(items) => {
                if items.len() > 1 {
                    warn!(
                        "Discarding duplicated primary keys for '{}': {key}",
                        self.column.name
                    );
                }
                items.first().unwrap_or(&Value::Null)
            }
            scalar => scalar,
        };
        let mut out = TupleOutput::new();
        write_scalar(&mut out, self.column, key, false)?;
        Ok(out.into_bytes())
    }

    pub fn decode(&self, bytes: &[u8]) -> CacheResult<Value> {
        let mut input = TupleInput::new(bytes);
        let value = read_scalar(&mut input, self.column.ty, false)?;
        if input.remaining() > 0 {
            return Err(EncodingError::TrailingBytes(input.remaining()).into());
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use crate::schema::CacheType;

    #[test]
    fn test_key_round_trip() {
        let column = Column::new("id", CacheType::Long);
        let codec = KeyCodec::new(&column);
        let bytes = codec.encode(&Value::Long(42)).unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0, 0, 0, 0, 42]);
        assert_eq!(codec.decode(&bytes).unwrap(), Value::Long(42));
    }

    #[test]
    fn test_multi_valued_key_keeps_first() {
        let column = Column::new("id", CacheType::String);
        let codec = KeyCodec::new(&column);
        let bytes = codec.encode(&Value::from(vec!["a", "b"])).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), Value::from("a"));
    }

    #[test]
    fn test_null_key_is_rejected() {
        let column = Column::new("id", CacheType::Int);
        let codec = KeyCodec::new(&column);
        assert!(matches!(
            codec.encode(&Value::Null),
            Err(CacheError::Encoding(EncodingError::NullNotAllowed { .. }))
        ));
        assert!(codec.encode(&Value::List(vec![])).is_err());
    }

    #[test]
    fn test_big_endian_keys_sort_for_non_negative_ints() {
        let column = Column::new("id", CacheType::Int);
        let codec = KeyCodec::new(&column);
        let a = codec.encode(&Value::Int(2)).unwrap();
        let b = codec.encode(&Value::Int(300)).unwrap();
        assert!(a < b);
    }
}
