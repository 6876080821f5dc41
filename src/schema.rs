//! Column types, schemas and the durable schema registry.
//!
//! A cache remembers its columns in a small properties file that lives beside
//! the data directory (`<base>/<name>_cache.properties`). Whatever is persisted
//! there wins over the caller's configuration, so a reopened cache always
//! decodes its entries with the schema they were written with.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::codec::TupleFraming;
use crate::error::{CacheError, CacheResult, SchemaError};
use crate::value::Record;

/// The fixed enumeration of storable column types.
///
/// Type names are the ones written to the properties file and accepted by the
/// `field-types` option; parsing ignores ASCII case.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, IntoStaticStr, EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum CacheType {
    #[strum(serialize = "BYTE")]
    Byte,
    #[strum(serialize = "SHORT")]
    Short,
    #[strum(serialize = "INTEGER")]
    Int,
    #[strum(serialize = "LONG")]
    Long,
    #[strum(serialize = "FLOAT")]
    Float,
    #[strum(serialize = "DOUBLE")]
    Double,
    #[strum(serialize = "BOOLEAN")]
    Boolean,
    #[strum(serialize = "CHARACTER")]
    Char,
    #[strum(serialize = "STRING")]
    String,
    /// Milliseconds since the Unix epoch.
    #[strum(serialize = "DATE")]
    Date,
    #[strum(serialize = "BIGINTEGER")]
    BigInteger,
    #[strum(serialize = "BIGDECIMAL")]
    BigDecimal,
    /// A decimal whose values are known to be integral; stored as a 32-bit int.
    #[strum(serialize = "BIGDECIMAL_INTEGER")]
    BigDecimalInt,
    #[strum(serialize = "CLOB")]
    LongText,
    /// Every value in the column is null; nothing is written for it.
    #[strum(serialize = "NULL")]
    Null,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: CacheType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: CacheType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Ordered columns plus the index of the primary-key column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
    key_index: usize,
}

impl Schema {
    /// Builds a schema, resolving the primary key by name. Without an explicit
    /// primary key the first column is assumed.
    pub fn new(columns: Vec<Column>, primary_key: Option<&str>) -> CacheResult<Self> {
        if columns.is_empty() {
            return Err(SchemaError::Empty.into());
        }
        let key_index = match primary_key {
            Some(pk) => columns
                .iter()
                .position(|c| c.name == pk)
                .or_else(|| columns.iter().position(|c| c.name.eq_ignore_ascii_case(pk)))
                .ok_or_else(|| SchemaError::UnknownPrimaryKey(pk.to_string()))?,
            None => {
                info!(
                    "Assuming {} is the primary key because it was not explicitly set...",
                    columns[0].name
                );
                0
            }
        };
        Ok(Self { columns, key_index })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn key_index(&self) -> usize {
        self.key_index
    }

    pub fn key_column(&self) -> &Column {
        &self.columns[self.key_index]
    }

    /// Number of values in every tuple (all columns but the key).
    pub fn tuple_width(&self) -> usize {
        self.columns.len() - 1
    }

    /// Non-key columns in schema order, i.e. tuple order.
    pub fn value_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != self.key_index)
            .map(|(_, c)| c)
    }

    /// Case-insensitive column lookup.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Position inside a tuple for a schema column index, `None` for the key.
    pub fn tuple_position(&self, column_index: usize) -> Option<usize> {
        match column_index.cmp(&self.key_index) {
            std::cmp::Ordering::Less => Some(column_index),
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Greater => Some(column_index - 1),
        }
    }

    pub fn names_joined(&self) -> String {
        join_names(&self.columns)
    }

    pub fn types_joined(&self) -> String {
        join_types(&self.columns)
    }
}

/// Infers columns from the first record added to a cache without a schema.
pub fn infer_columns(record: &Record) -> Vec<Column> {
    record
        .iter()
        .map(|(name, value)| Column::new(name, value.inferred_type()))
        .collect()
}

/// Parses comma-separated names and type names into columns.
pub fn parse_columns(names: &str, types: &str) -> CacheResult<Vec<Column>> {
    let names = split_list(names);
    let types = split_list(types)
        .into_iter()
        .map(|t| {
            CacheType::from_str(&t)
                .map_err(|_| CacheError::config(format!("Unknown field type '{t}'")))
        })
        .collect::<CacheResult<Vec<_>>>()?;
    if names.len() != types.len() {
        return Err(CacheError::config(format!(
            "{} field names but {} field types were given",
            names.len(),
            types.len()
        )));
    }
    Ok(names
        .into_iter()
        .zip(types)
        .map(|(name, ty)| Column::new(name, ty))
        .collect())
}

fn split_list(list: &str) -> Vec<String> {
    if list.trim().is_empty() {
        return Vec::new();
    }
    list.split(',').map(|s| s.trim().to_string()).collect()
}

fn join_names(columns: &[Column]) -> String {
    columns
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

fn join_types(columns: &[Column]) -> String {
    columns
        .iter()
        .map(|c| -> &'static str { c.ty.into() })
        .collect::<Vec<_>>()
        .join(",")
}

/// On-disk form of the properties file.
#[derive(Debug, Serialize, Deserialize)]
struct CacheProperties {
    #[serde(rename = "CACHE_NAMES")]
    names: String,
    #[serde(rename = "CACHE_TYPES")]
    types: String,
    #[serde(rename = "CACHE_FRAMING", default, skip_serializing_if = "Option::is_none")]
    framing: Option<String>,
}

impl CacheProperties {
    /// Parses the TOML form this crate writes. Files that are not TOML are
    /// read as plain `KEY=value` lines, skipping `#` and `!` comments.
    fn parse(content: &str) -> Result<Self, String> {
        let toml_error = match toml::from_str(content) {
            Ok(props) => return Ok(props),
            Err(e) => e,
        };
        let mut names = None;
        let mut types = None;
        let mut framing = None;
        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let Some((key, value)) = line.split_once(['=', ':']) else {
                continue;
            };
            let value = value.trim().replace("\\:", ":").replace("\\=", "=");
            match key.trim() {
                "CACHE_NAMES" => names = Some(value),
                "CACHE_TYPES" => types = Some(value),
                "CACHE_FRAMING" => framing = Some(value),
                _ => {}
            }
        }
        match (names, types) {
            (Some(names), Some(types)) => Ok(Self {
                names,
                types,
                framing,
            }),
            _ => Err(toml_error.to_string()),
        }
    }
}

/// Columns and framing read back from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSchema {
    pub columns: Vec<Column>,
    pub framing: TupleFraming,
}

/// Outcome of schema resolution at open time. `schema` is `None` when the
/// schema is still to be inferred from the first record.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub schema: Option<Schema>,
    pub framing: TupleFraming,
}

/// Reads and writes the properties file of one cache.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    path: PathBuf,
}

impl SchemaRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> CacheResult<Option<PersistedSchema>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content =
            fs::read_to_string(&self.path).map_err(|e| CacheError::io(&self.path, e))?;
        let props =
            CacheProperties::parse(&content).map_err(|reason| SchemaError::Properties {
                path: self.path.clone(),
                reason,
            })?;
        let columns = parse_columns(&props.names, &props.types).map_err(|e| {
            SchemaError::Properties {
                path: self.path.clone(),
                reason: e.to_string(),
            }
        })?;
        // Files written before the framing entry existed use continuation flags.
        let framing = match props.framing {
            Some(f) => TupleFraming::from_str(&f).map_err(|_| SchemaError::Properties {
                path: self.path.clone(),
                reason: format!("unknown tuple framing '{f}'"),
            })?,
            None => TupleFraming::Continuation,
        };
        Ok(Some(PersistedSchema { columns, framing }))
    }

    pub fn persist(&self, columns: &[Column], framing: TupleFraming) -> CacheResult<()> {
        let props = CacheProperties {
            names: join_names(columns),
            types: join_types(columns),
            framing: Some(framing.to_string()),
        };
        let content = toml::to_string(&props).map_err(|e| SchemaError::Properties {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
        }
        fs::write(&self.path, content).map_err(|e| CacheError::io(&self.path, e))?;
        info!("FIELD NAMES: [{}]", props.names);
        info!("FIELD TYPES: [{}]", props.types);
        Ok(())
    }

    /// Deletes the properties file. Failure is logged, not returned.
    pub fn remove(&self) -> bool {
        if !self.path.exists() {
            return true;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not delete cache Property File: {:?}: {}", self.path, e);
                false
            }
        }
    }

    /// Applies the precedence rules: persisted > explicit > inferred later.
    pub fn resolve(
        &self,
        explicit: Option<&[Column]>,
        primary_key: Option<&str>,
        read_only: bool,
        framing: TupleFraming,
    ) -> CacheResult<Resolution> {
        match self.load()? {
            Some(persisted) => {
                if let Some(explicit) = explicit
                    && explicit != persisted.columns.as_slice()
                {
                    warn!(
                        "Configured fields [{}] differ from the persisted fields [{}] in {:?}; using the persisted schema",
                        join_names(explicit),
                        join_names(&persisted.columns),
                        self.path
                    );
                }
                Ok(Resolution {
                    schema: Some(Schema::new(persisted.columns, primary_key)?),
                    framing: persisted.framing,
                })
            }
            None if read_only => {
                Err(SchemaError::PersistedSchemaRequired(self.path.clone()).into())
            }
            None => {
                let schema = match explicit {
                    Some(columns) => {
                        let schema = Schema::new(columns.to_vec(), primary_key)?;
                        self.persist(columns, framing)?;
                        Some(schema)
                    }
                    None => None,
                };
                Ok(Resolution { schema, framing })
            }
        }
    }
}
