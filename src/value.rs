//! Typed field values and ordered records.
//!
//! [`Value`] is the tagged union of every kind a column can hold. Producers hand
//! the cache [`Record`]s, which keep their fields in insertion order so that
//! schema inference sees the columns the way the producer emitted them.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::schema::CacheType;

/// A single field value. `List` carries the elements of a multi-valued field.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Char(char),
    String(String),
    Date(DateTime<Utc>),
    BigInteger(BigInt),
    BigDecimal(BigDecimal),
    LongText(String),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short human readable kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Byte(_) => "byte",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Boolean(_) => "boolean",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::BigInteger(_) => "big integer",
            Value::BigDecimal(_) => "big decimal",
            Value::LongText(_) => "long text",
            Value::List(_) => "list",
        }
    }

    /// The column type a value of this kind is stored as when the schema is
    /// inferred. Lists are typed by their first element; anything without a
    /// natural type falls back to [`CacheType::String`].
    pub fn inferred_type(&self) -> CacheType {
        match self {
            Value::Byte(_) => CacheType::Byte,
            Value::Short(_) => CacheType::Short,
            Value::Int(_) => CacheType::Int,
            Value::Long(_) => CacheType::Long,
            Value::Float(_) => CacheType::Float,
            Value::Double(_) => CacheType::Double,
            Value::Boolean(_) => CacheType::Boolean,
            Value::Char(_) => CacheType::Char,
            Value::Date(_) => CacheType::Date,
            Value::BigInteger(_) => CacheType::BigInteger,
            Value::BigDecimal(_) => CacheType::BigDecimal,
            Value::LongText(_) => CacheType::LongText,
            Value::List(items) => items
                .first()
                .map(Value::inferred_type)
                .unwrap_or(CacheType::String),
            Value::Null | Value::String(_) => CacheType::String,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Byte(_) => 1,
            Value::Short(_) => 2,
            Value::Int(_) => 3,
            Value::Long(_) => 4,
            Value::Float(_) => 5,
            Value::Double(_) => 6,
            Value::Boolean(_) => 7,
            Value::Char(_) => 8,
            Value::String(_) => 9,
            Value::Date(_) => 10,
            Value::BigInteger(_) => 11,
            Value::BigDecimal(_) => 12,
            Value::LongText(_) => 13,
            Value::List(_) => 14,
        }
    }

    /// Producers wrap every field in a list; single-element lists are stored as
    /// plain scalars.
    pub fn unwrap_singleton(self) -> Value {
        match self {
            Value::List(mut items) if items.len() == 1 => items.remove(0),
            other => other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Byte(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Char(v) => write!(f, "{v}"),
            Value::String(v) | Value::LongText(v) => f.write_str(v),
            Value::Date(v) => write!(f, "{}", v.to_rfc3339()),
            Value::BigInteger(v) => write!(f, "{v}"),
            Value::BigDecimal(v) => write!(f, "{v}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

// Floats hash by bit pattern and every variant is tagged with a fixed byte, so
// the hash of a key is stable across processes for a given hasher.
impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(self.tag());
        match self {
            Value::Null => {}
            Value::Byte(v) => v.hash(state),
            Value::Short(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Long(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Double(v) => v.to_bits().hash(state),
            Value::Boolean(v) => v.hash(state),
            Value::Char(v) => v.hash(state),
            Value::String(v) | Value::LongText(v) => v.hash(state),
            Value::Date(v) => {
                v.timestamp().hash(state);
                v.timestamp_subsec_nanos().hash(state);
            }
            Value::BigInteger(v) => v.hash(state),
            Value::BigDecimal(v) => v.to_string().hash(state),
            Value::List(items) => items.hash(state),
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_scalar!(
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    bool => Boolean,
    char => Char,
    String => String,
    DateTime<Utc> => Date,
    BigInt => BigInteger,
    BigDecimal => BigDecimal,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// An ordered mapping of field name to value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Builder style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets a field, replacing an existing field of the same name in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn get_ignore_case(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn first(&self) -> Option<(&str, &Value)> {
        self.fields.first().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}
