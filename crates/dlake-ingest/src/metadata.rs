//! Per-object configuration
//!
//! Uploaders attach free-form key/value metadata to each CSV object. This
//! module turns that map into a [`ResolvedMetadata`] once, at the boundary:
//! every value is parsed and validated here, so later stages only ever see
//! typed settings (a closed [`CastType`] enum, a normalized
//! [`PartitionSpec`], known codecs and write modes).

use std::collections::BTreeMap;
use std::str::FromStr;

use encoding_rs::Encoding;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{IngestError, Result};
use crate::literal::{parse_literal, Literal};
use crate::normalize::normalize_name;

pub const PARTITION_COLS_KEY: &str = "partition-cols";
pub const CUSTOM_CAST_KEY: &str = "custom-cast";
pub const SEPARATOR_KEY: &str = "separator";
pub const DECIMAL_CHAR_KEY: &str = "decimal-char";
pub const FILE_ENCODING_KEY: &str = "file-encoding";
pub const OUTPUT_COMPRESSION_KEY: &str = "output-compression";
pub const OUTPUT_MODE_KEY: &str = "output-mode";
pub const OUTPUT_STR_UPPER_KEY: &str = "output-str-upper";

/// Prefix S3 puts on user metadata when it is seen as raw headers
const AMZ_META_PREFIX: &str = "x-amz-meta-";

/// Raw object metadata. Keys are case-insensitive and stored lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, String>",
    into = "BTreeMap<String, String>"
)]
pub struct ObjectMetadata(BTreeMap<String, String>);

impl ObjectMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        let key = key.as_ref().trim().to_lowercase();
        let key = key.strip_prefix(AMZ_META_PREFIX).unwrap_or(&key).to_string();
        self.0.insert(key, value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Value for `key`, treating blank values as absent
    fn setting(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for ObjectMetadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metadata = ObjectMetadata::new();
        for (key, value) in iter {
            metadata.insert(key, value);
        }
        metadata
    }
}

impl From<BTreeMap<String, String>> for ObjectMetadata {
    fn from(map: BTreeMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<ObjectMetadata> for BTreeMap<String, String> {
    fn from(metadata: ObjectMetadata) -> Self {
        metadata.0
    }
}

/// Target type of a custom cast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CastType {
    Date,
    Datetime,
    Int,
    Float,
    String,
}

impl CastType {
    pub fn as_str(self) -> &'static str {
        match self {
            CastType::Date => "date",
            CastType::Datetime => "datetime",
            CastType::Int => "int",
            CastType::Float => "float",
            CastType::String => "string",
        }
    }
}

impl FromStr for CastType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "date" => Ok(CastType::Date),
            "datetime" => Ok(CastType::Datetime),
            "int" => Ok(CastType::Int),
            "float" => Ok(CastType::Float),
            "string" => Ok(CastType::String),
            other => Err(other.to_string()),
        }
    }
}

impl std::fmt::Display for CastType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered column → cast type mapping. Column names are the raw CSV
/// headers; casting happens before names are normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CastSchema {
    entries: Vec<(String, CastType)>,
}

impl CastSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(column, tag)` pairs, rejecting unknown tags.
    ///
    /// A column listed twice keeps its first position and its last tag.
    pub fn from_tags<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut schema = Self::new();
        for (column, tag) in pairs {
            let column = column.into();
            let cast_type = tag.as_ref().trim().parse::<CastType>().map_err(|tag| {
                IngestError::UnrecognizedCastType {
                    column: column.clone(),
                    tag,
                }
            })?;
            schema.insert(column, cast_type);
        }
        Ok(schema)
    }

    pub fn insert(&mut self, column: impl Into<String>, cast_type: CastType) {
        let column = column.into();
        match self.entries.iter_mut().find(|(name, _)| *name == column) {
            Some(entry) => entry.1 = cast_type,
            None => self.entries.push((column, cast_type)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, CastType)> {
        self.entries.iter().map(|(name, t)| (name.as_str(), *t))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for CastSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (column, cast_type) in &self.entries {
            map.serialize_entry(column, cast_type)?;
        }
        map.end()
    }
}

/// Normalized partition column names, in partition order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PartitionSpec(Vec<String>);

impl PartitionSpec {
    /// Not partitioned
    pub fn none() -> Self {
        Self::default()
    }

    /// Normalizes every name
    pub fn from_names<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> Self {
        Self(
            names
                .into_iter()
                .map(|n| normalize_name(n.as_ref().trim()))
                .filter(|n| !n.is_empty())
                .collect(),
        )
    }

    pub fn columns(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.iter().any(|c| c == column)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Parquet codec for the output files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Snappy,
    Gzip,
    Zstd,
    Uncompressed,
}

impl Compression {
    pub fn as_str(self) -> &'static str {
        match self {
            Compression::Snappy => "snappy",
            Compression::Gzip => "gzip",
            Compression::Zstd => "zstd",
            Compression::Uncompressed => "uncompressed",
        }
    }

    /// Infix used in output file names, e.g. `part-x.snappy.parquet`
    pub fn file_infix(self) -> Option<&'static str> {
        match self {
            Compression::Snappy => Some("snappy"),
            Compression::Gzip => Some("gz"),
            Compression::Zstd => Some("zstd"),
            Compression::Uncompressed => None,
        }
    }
}

impl FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "snappy" => Ok(Compression::Snappy),
            "gzip" | "gz" => Ok(Compression::Gzip),
            "zstd" => Ok(Compression::Zstd),
            "none" | "uncompressed" => Ok(Compression::Uncompressed),
            _ => Err(s.to_string()),
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a write treats data already at the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Replace only the partitions present in the batch
    #[default]
    OverwritePartitions,
    /// Replace the whole table
    Overwrite,
    /// Only add files
    Append,
}

impl OutputMode {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputMode::OverwritePartitions => "overwrite_partitions",
            OutputMode::Overwrite => "overwrite",
            OutputMode::Append => "append",
        }
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overwrite_partitions" => Ok(OutputMode::OverwritePartitions),
            "overwrite" => Ok(OutputMode::Overwrite),
            "append" => Ok(OutputMode::Append),
            _ => Err(s.to_string()),
        }
    }
}

impl std::fmt::Display for OutputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for parsing the delimited source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadOptions {
    #[serde(serialize_with = "serialize_byte_char")]
    pub separator: u8,
    pub decimal_char: char,
    #[serde(serialize_with = "serialize_encoding")]
    pub encoding: &'static Encoding,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            separator: b',',
            decimal_char: '.',
            encoding: encoding_rs::UTF_8,
        }
    }
}

fn serialize_byte_char<S: Serializer>(byte: &u8, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_char(char::from(*byte))
}

fn serialize_encoding<S: Serializer>(
    encoding: &&'static Encoding,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(encoding.name())
}

/// Fully validated per-object settings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedMetadata {
    pub cast_schema: CastSchema,
    pub partition_cols: PartitionSpec,
    #[serde(flatten)]
    pub read: ReadOptions,
    pub compression: Compression,
    pub output_mode: OutputMode,
    pub uppercase_strings: bool,
}

impl Default for ResolvedMetadata {
    fn default() -> Self {
        Self {
            cast_schema: CastSchema::new(),
            partition_cols: PartitionSpec::none(),
            read: ReadOptions::default(),
            compression: Compression::default(),
            output_mode: OutputMode::default(),
            uppercase_strings: true,
        }
    }
}

/// Resolve `raw` metadata of the object at `source_path`.
///
/// Absent keys take their defaults; malformed values fail with a validation
/// error naming `source_path`.
pub fn resolve(source_path: &str, raw: &ObjectMetadata) -> Result<ResolvedMetadata> {
    let cast_schema = match raw.setting(CUSTOM_CAST_KEY) {
        Some(value) => parse_cast_schema(source_path, value)?,
        None => CastSchema::new(),
    };

    let partition_cols = match raw.setting(PARTITION_COLS_KEY) {
        Some(value) => parse_partition_cols(source_path, value)?,
        None => PartitionSpec::none(),
    };

    let separator = match raw.get(SEPARATOR_KEY).filter(|v| !v.is_empty()) {
        Some(value) => parse_separator(value).ok_or_else(|| invalid(source_path, SEPARATOR_KEY, value))?,
        None => b',',
    };

    let decimal_char = match raw.setting(DECIMAL_CHAR_KEY) {
        Some(value) => {
            let mut chars = value.trim().chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) if ch != char::from(separator) => ch,
                _ => return Err(invalid(source_path, DECIMAL_CHAR_KEY, value)),
            }
        },
        None => '.',
    };

    let encoding = match raw.setting(FILE_ENCODING_KEY) {
        Some(value) => lookup_encoding(value).ok_or_else(|| invalid(source_path, FILE_ENCODING_KEY, value))?,
        None => encoding_rs::UTF_8,
    };

    let compression = match raw.setting(OUTPUT_COMPRESSION_KEY) {
        Some(value) => value
            .parse()
            .map_err(|_| invalid(source_path, OUTPUT_COMPRESSION_KEY, value))?,
        None => Compression::default(),
    };

    let output_mode = match raw.setting(OUTPUT_MODE_KEY) {
        Some(value) => value
            .parse()
            .map_err(|_| invalid(source_path, OUTPUT_MODE_KEY, value))?,
        None => OutputMode::default(),
    };

    let uppercase_strings = raw
        .get(OUTPUT_STR_UPPER_KEY)
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(true);

    Ok(ResolvedMetadata {
        cast_schema,
        partition_cols,
        read: ReadOptions {
            separator,
            decimal_char,
            encoding,
        },
        compression,
        output_mode,
        uppercase_strings,
    })
}

/// Parse a `partition-cols` value.
///
/// A value that is not a literal at all is taken as one column name.
pub fn parse_partition_cols(source_path: &str, raw: &str) -> Result<PartitionSpec> {
    let trimmed = raw.trim();
    let reject = || IngestError::InvalidPartitionSpec {
        path: source_path.to_string(),
        value: trimmed.to_string(),
    };

    match parse_literal(trimmed) {
        Err(_) => Ok(PartitionSpec::from_names([trimmed])),
        Ok(Literal::Str(name)) => Ok(PartitionSpec::from_names([name])),
        Ok(Literal::List(items) | Literal::Tuple(items)) => {
            let names = items
                .iter()
                .map(|item| item.as_str().ok_or_else(reject))
                .collect::<Result<Vec<_>>>()?;
            Ok(PartitionSpec::from_names(names))
        },
        Ok(_) => Err(reject()),
    }
}

/// Parse a `custom-cast` value into a typed schema
pub fn parse_cast_schema(source_path: &str, raw: &str) -> Result<CastSchema> {
    let reject = |reason: String| IngestError::InvalidCastSchema {
        path: source_path.to_string(),
        reason,
    };

    let entries = match parse_literal(raw.trim()) {
        Ok(Literal::Dict(entries)) => entries,
        Ok(other) => return Err(reject(format!("expected a mapping, got a {}", other.kind()))),
        Err(e) => return Err(reject(format!("not a literal mapping ({}): {}", e, raw.trim()))),
    };

    let mut pairs = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        let (Literal::Str(column), Literal::Str(tag)) = (&key, &value) else {
            return Err(reject(format!(
                "entries must map column names to type names, got {} -> {}",
                key.kind(),
                value.kind()
            )));
        };
        pairs.push((column.clone(), tag.clone()));
    }
    CastSchema::from_tags(pairs)
}

fn parse_separator(value: &str) -> Option<u8> {
    match value {
        "\\t" | "tab" | "TAB" => return Some(b'\t'),
        _ => {},
    }
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) if ch.is_ascii() && !matches!(ch, '"' | '\n' | '\r') => Some(ch as u8),
        _ => None,
    }
}

/// Look up an encoding by WHATWG label. Underscore spellings (`utf_8`) and
/// a `-sig` suffix (`utf-8-sig`) are accepted too.
pub fn lookup_encoding(label: &str) -> Option<&'static Encoding> {
    let label = label.trim().to_lowercase();
    let label = label.strip_suffix("-sig").unwrap_or(&label);
    Encoding::for_label(label.as_bytes())
        .or_else(|| Encoding::for_label(label.replace('_', "-").as_bytes()))
}

fn invalid(source_path: &str, key: &str, value: &str) -> IngestError {
    IngestError::InvalidOption {
        path: source_path.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    }
}
