//! Error types for every layer of the cache.
//!
//! All fallible operations return [`CacheResult`]. Engine specific failures are
//! wrapped into [`EngineError`] so that callers can match on the taxonomy without
//! depending on the backend crates directly.

use std::path::PathBuf;
use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Configuration Error: {0}")]
    Configuration(String),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("IO Error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        CacheError::Configuration(msg.into())
    }
}

/// An operation was invoked in the wrong lifecycle state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Must call open() before using this cache")]
    NotOpen,
    #[error("The cache is already open")]
    AlreadyOpen,
    #[error("The cache was opened read-only")]
    ReadOnly,
}

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("persisted schema required for read-only cache, but {0:?} does not exist")]
    PersistedSchemaRequired(PathBuf),

    #[error("Decoded tuple has {found} fields, schema expects {expected}")]
    FieldCountMismatch { expected: usize, found: usize },

    #[error("Primary key column '{0}' is not part of the schema")]
    UnknownPrimaryKey(String),

    #[error("A schema needs at least one column")]
    Empty,

    #[error("Malformed cache properties file {path:?}: {reason}")]
    Properties { path: PathBuf, reason: String },
}

#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("A NULL was attempted for write to column '{column}' but is not allowed")]
    NullNotAllowed { column: String },

    #[error("Column '{column}' expects {expected} but got {found}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Character {0:?} does not fit in a single UTF-16 code unit")]
    CharOutOfRange(char),

    #[error("Decoded code unit {0:#06x} is not a valid character")]
    InvalidChar(u16),

    #[error("Value {value} in column '{column}' does not fit in a 32-bit integer")]
    IntOutOfRange { column: String, value: String },

    #[error("Decoded timestamp {0} is out of range")]
    InvalidDate(i64),

    #[error("Decoded decimal text '{0}' is not a number")]
    InvalidDecimal(String),

    #[error("Invalid sign byte {0} for big integer")]
    InvalidSign(i8),

    #[error("Entry has {0} trailing bytes after the last tuple")]
    TrailingBytes(usize),

    #[error("Entry declares zero tuples")]
    EmptyEntry,

    #[error("There was an error encoding a value")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("There was an error decoding a value")]
    Decode(#[from] bincode::error::DecodeError),
}

/// Failures raised by (or on behalf of) the storage engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[cfg(feature = "redb")]
    #[error("Redb Database Error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[cfg(feature = "redb")]
    #[error("Redb Transaction Error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[cfg(feature = "redb")]
    #[error("Redb Table Error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[cfg(feature = "redb")]
    #[error("Redb Storage Error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[cfg(feature = "redb")]
    #[error("Redb Commit Error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[cfg(feature = "redb")]
    #[error("Redb Set Durability Error: {0}")]
    RedbSetDurability(#[from] redb::SetDurabilityError),

    #[cfg(feature = "sled")]
    #[error("Sled Error: {0}")]
    Sled(#[from] sled::Error),

    #[error(
        "Cursor for cache '{cache}' was used from a thread other than the one that opened it. \
         If using multiple threads, you must set transactional to true."
    )]
    ThreadAffinity { cache: String },
}

macro_rules! impl_from_engine {
    ($($(#[$meta:meta])* $err:ty),* $(,)?) => {
        $(
            $(#[$meta])*
            impl From<$err> for CacheError {
                fn from(err: $err) -> Self {
                    CacheError::Engine(EngineError::from(err))
                }
            }
        )*
    };
}

impl_from_engine!(
    #[cfg(feature = "redb")]
    redb::DatabaseError,
    #[cfg(feature = "redb")]
    redb::TransactionError,
    #[cfg(feature = "redb")]
    redb::TableError,
    #[cfg(feature = "redb")]
    redb::StorageError,
    #[cfg(feature = "redb")]
    redb::CommitError,
    #[cfg(feature = "redb")]
    redb::SetDurabilityError,
    #[cfg(feature = "sled")]
    sled::Error,
);

impl From<bincode::error::EncodeError> for CacheError {
    fn from(err: bincode::error::EncodeError) -> Self {
        CacheError::Encoding(EncodingError::Encode(err))
    }
}

impl From<bincode::error::DecodeError> for CacheError {
    fn from(err: bincode::error::DecodeError) -> Self {
        CacheError::Encoding(EncodingError::Decode(err))
    }
}
