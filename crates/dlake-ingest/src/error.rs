//! Per-object pipeline errors
//!
//! Every variant carries the object path or column it concerns so that the
//! failure notification is actionable without digging through logs.

use serde::Serialize;
use thiserror::Error;

use crate::metadata::CastType;
use crate::table::TableError;

/// Result type alias for pipeline stages
pub type Result<T> = std::result::Result<T, IngestError>;

/// Coarse classification used in reports and log fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    SourceRead,
    Cast,
    Write,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::SourceRead => "source_read",
            ErrorKind::Cast => "cast",
            ErrorKind::Write => "write",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Invalid partition-cols metadata on {path}: expected a list of column names, got {value}")]
    InvalidPartitionSpec { path: String, value: String },

    #[error("Invalid custom-cast metadata on {path}: {reason}")]
    InvalidCastSchema { path: String, reason: String },

    #[error(
        "Unable to cast column {column}. Expected either int, float, date, datetime or string and received {tag}"
    )]
    UnrecognizedCastType { column: String, tag: String },

    #[error("Invalid {key} metadata on {path}: {value}")]
    InvalidOption {
        path: String,
        key: String,
        value: String,
    },

    #[error("Failed to read csv {location}: {reason}")]
    SourceRead { location: String, reason: String },

    #[error("Could not cast column {column} to {cast_type}: {reason}")]
    CastFailure {
        column: String,
        cast_type: CastType,
        reason: String,
    },

    #[error("Failed to write {destination}: {reason}")]
    WriteFailure { destination: String, reason: String },

    #[error("Table error: {0}")]
    Table(#[from] TableError),
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::InvalidPartitionSpec { .. }
            | IngestError::InvalidCastSchema { .. }
            | IngestError::UnrecognizedCastType { .. }
            | IngestError::InvalidOption { .. } => ErrorKind::Validation,
            IngestError::SourceRead { .. } => ErrorKind::SourceRead,
            IngestError::CastFailure { .. } => ErrorKind::Cast,
            IngestError::WriteFailure { .. } | IngestError::Table(_) => ErrorKind::Write,
        }
    }

    pub fn source_read(location: impl ToString, err: &anyhow::Error) -> Self {
        IngestError::SourceRead {
            location: location.to_string(),
            reason: format!("{:#}", err),
        }
    }

    pub fn write_failure(destination: impl ToString, reason: impl ToString) -> Self {
        IngestError::WriteFailure {
            destination: destination.to_string(),
            reason: reason.to_string(),
        }
    }
}
