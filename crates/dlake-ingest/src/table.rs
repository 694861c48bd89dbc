//! In-memory tabular data
//!
//! A [`Table`] is built fresh for every source object by the reader, mutated
//! in place by the cast/enrich/normalize stages, and handed to the writer.
//! Columns are typed vectors of optional values; `None` is the null marker.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Logical column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Utf8,
    Int64,
    Float64,
    Boolean,
    Date,
    Timestamp,
}

impl DataType {
    /// Type name as registered in the table catalog (Hive/Athena spelling)
    pub fn catalog_type(self) -> &'static str {
        match self {
            DataType::Utf8 => "string",
            DataType::Int64 => "bigint",
            DataType::Float64 => "double",
            DataType::Boolean => "boolean",
            DataType::Date => "date",
            DataType::Timestamp => "timestamp",
        }
    }

    /// Inverse of [`DataType::catalog_type`]
    pub fn from_catalog_type(name: &str) -> Option<DataType> {
        match name {
            "string" => Some(DataType::Utf8),
            "bigint" => Some(DataType::Int64),
            "double" => Some(DataType::Float64),
            "boolean" => Some(DataType::Boolean),
            "date" => Some(DataType::Date),
            "timestamp" => Some(DataType::Timestamp),
            _ => None,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.catalog_type())
    }
}

/// Column values, one vector per physical type
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Utf8(Vec<Option<String>>),
    Int64(Vec<Option<i64>>),
    Float64(Vec<Option<f64>>),
    Boolean(Vec<Option<bool>>),
    Date(Vec<Option<NaiveDate>>),
    Timestamp(Vec<Option<NaiveDateTime>>),
}

impl ColumnData {
    /// `len` nulls of type `data_type`
    pub fn nulls(data_type: DataType, len: usize) -> Self {
        match data_type {
            DataType::Utf8 => ColumnData::Utf8(vec![None; len]),
            DataType::Int64 => ColumnData::Int64(vec![None; len]),
            DataType::Float64 => ColumnData::Float64(vec![None; len]),
            DataType::Boolean => ColumnData::Boolean(vec![None; len]),
            DataType::Date => ColumnData::Date(vec![None; len]),
            DataType::Timestamp => ColumnData::Timestamp(vec![None; len]),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Utf8(v) => v.len(),
            ColumnData::Int64(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::Boolean(v) => v.len(),
            ColumnData::Date(v) => v.len(),
            ColumnData::Timestamp(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ColumnData::Utf8(_) => DataType::Utf8,
            ColumnData::Int64(_) => DataType::Int64,
            ColumnData::Float64(_) => DataType::Float64,
            ColumnData::Boolean(_) => DataType::Boolean,
            ColumnData::Date(_) => DataType::Date,
            ColumnData::Timestamp(_) => DataType::Timestamp,
        }
    }

    pub fn is_null(&self, row: usize) -> bool {
        match self {
            ColumnData::Utf8(v) => v.get(row).is_none_or(Option::is_none),
            ColumnData::Int64(v) => v.get(row).is_none_or(Option::is_none),
            ColumnData::Float64(v) => v.get(row).is_none_or(Option::is_none),
            ColumnData::Boolean(v) => v.get(row).is_none_or(Option::is_none),
            ColumnData::Date(v) => v.get(row).is_none_or(Option::is_none),
            ColumnData::Timestamp(v) => v.get(row).is_none_or(Option::is_none),
        }
    }

    pub fn null_count(&self) -> usize {
        (0..self.len()).filter(|&row| self.is_null(row)).count()
    }

    /// Text rendering of one value, `None` for nulls.
    ///
    /// Matches how the values read back as text: floats keep a trailing `.0`,
    /// booleans are `True`/`False`, timestamps drop a zero fraction.
    pub fn display_value(&self, row: usize) -> Option<String> {
        match self {
            ColumnData::Utf8(v) => v.get(row)?.clone(),
            ColumnData::Int64(v) => v.get(row)?.map(|x| x.to_string()),
            ColumnData::Float64(v) => v.get(row)?.map(format_float),
            ColumnData::Boolean(v) => {
                v.get(row)?.map(|b| if b { "True" } else { "False" }.to_string())
            },
            ColumnData::Date(v) => v.get(row)?.map(|d| d.format("%Y-%m-%d").to_string()),
            ColumnData::Timestamp(v) => v.get(row)?.map(format_timestamp),
        }
    }

    /// New column holding the values at `rows`, in that order
    pub fn take(&self, rows: &[usize]) -> ColumnData {
        fn pick<T: Clone>(values: &[Option<T>], rows: &[usize]) -> Vec<Option<T>> {
            rows.iter()
                .map(|&row| values.get(row).cloned().flatten())
                .collect()
        }

        match self {
            ColumnData::Utf8(v) => ColumnData::Utf8(pick(v, rows)),
            ColumnData::Int64(v) => ColumnData::Int64(pick(v, rows)),
            ColumnData::Float64(v) => ColumnData::Float64(pick(v, rows)),
            ColumnData::Boolean(v) => ColumnData::Boolean(pick(v, rows)),
            ColumnData::Date(v) => ColumnData::Date(pick(v, rows)),
            ColumnData::Timestamp(v) => ColumnData::Timestamp(pick(v, rows)),
        }
    }
}

/// Float text the way the source files and downstream readers expect it:
/// integral values keep one decimal (`3.0`), everything else is shortest repr.
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        value.to_string()
    }
}

pub fn format_timestamp(value: NaiveDateTime) -> String {
    if value.nanosecond() == 0 {
        value.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        value.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }
}

/// Days since 1970-01-01, the Date32 encoding used by Arrow and Parquet
pub fn days_since_epoch(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - 719_163
}

/// A named column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }
}

/// Structural errors when assembling a table
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("column {column} has {actual} rows, table has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("column {0} does not exist")]
    UnknownColumn(String),
}

/// Rows x named, typed columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    num_rows: usize,
}

impl Table {
    /// An empty table: no columns, no rows
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from columns of equal length
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, TableError> {
        let num_rows = columns.first().map(|c| c.data.len()).unwrap_or(0);
        for column in &columns {
            if column.data.len() != num_rows {
                return Err(TableError::LengthMismatch {
                    column: column.name.clone(),
                    expected: num_rows,
                    actual: column.data.len(),
                });
            }
        }
        Ok(Self { columns, num_rows })
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// True when there are no rows, whatever the column count
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Replace the values of an existing column, keeping its position
    pub fn replace_column_data(&mut self, name: &str, data: ColumnData) -> Result<(), TableError> {
        if data.len() != self.num_rows {
            return Err(TableError::LengthMismatch {
                column: name.to_string(),
                expected: self.num_rows,
                actual: data.len(),
            });
        }
        let column = self
            .columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| TableError::UnknownColumn(name.to_string()))?;
        column.data = data;
        Ok(())
    }

    /// Append a column, or replace the values of a column with the same name.
    ///
    /// The first column added to a column-less table sets the row count.
    pub fn set_column(&mut self, column: Column) -> Result<(), TableError> {
        if self.columns.is_empty() {
            self.num_rows = column.data.len();
        } else if column.data.len() != self.num_rows {
            return Err(TableError::LengthMismatch {
                column: column.name,
                expected: self.num_rows,
                actual: column.data.len(),
            });
        }

        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => existing.data = column.data,
            None => self.columns.push(column),
        }
        Ok(())
    }

    /// Apply `f` to every column's data in place. `f` must keep the length.
    pub fn for_each_column_mut(&mut self, mut f: impl FnMut(&mut Column)) {
        for column in &mut self.columns {
            f(column);
        }
    }

    /// Rename every column with `f`
    pub fn rename_columns(&mut self, mut f: impl FnMut(&str) -> String) {
        for column in &mut self.columns {
            column.name = f(&column.name);
        }
    }

    /// New table with the given rows and only the columns at `column_indices`
    pub fn select(&self, rows: &[usize], column_indices: &[usize]) -> Table {
        let columns = column_indices
            .iter()
            .filter_map(|&idx| self.columns.get(idx))
            .map(|c| Column::new(c.name.clone(), c.data.take(rows)))
            .collect();
        Table {
            columns,
            num_rows: rows.len(),
        }
    }
}
