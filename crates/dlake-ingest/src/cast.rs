//! Custom casts
//!
//! Applies a [`CastSchema`] to a freshly read table, column by column in
//! mapping order. A column named in the schema but missing from the file is
//! skipped with a warning; any value that cannot be converted fails the
//! whole object.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, warn};

use crate::error::{IngestError, Result};
use crate::metadata::{CastSchema, CastType};
use crate::table::{format_float, ColumnData, Table};

/// Datetime layouts tried in order. `%.f` also matches a missing fraction.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Same, with a UTC offset
const OFFSET_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Apply `schema` to `table`
pub fn cast(mut table: Table, schema: &CastSchema) -> Result<Table> {
    for (column, cast_type) in schema.iter() {
        let Some(existing) = table.column(column) else {
            warn!(
                column = %column,
                cast_type = %cast_type,
                "Skipping cast as the column does not exist on the csv file"
            );
            continue;
        };

        let data = cast_column(&existing.data, cast_type).map_err(|reason| IngestError::CastFailure {
            column: column.to_string(),
            cast_type,
            reason,
        })?;
        table.replace_column_data(column, data)?;
        debug!(column = %column, cast_type = %cast_type, "Cast column");
    }
    Ok(table)
}

/// Convert one column. The error is a human-readable reason.
pub fn cast_column(data: &ColumnData, to: CastType) -> std::result::Result<ColumnData, String> {
    match to {
        CastType::Date => to_date(data).map(ColumnData::Date),
        CastType::Datetime => to_timestamp(data).map(ColumnData::Timestamp),
        CastType::Int => to_int(data).map(ColumnData::Int64),
        CastType::Float => to_float(data).map(ColumnData::Float64),
        CastType::String => Ok(to_text(data)),
    }
}

/// Map every non-null value with `f`, stopping at the first failure
fn try_map<T, U>(
    values: &[Option<T>],
    mut f: impl FnMut(&T) -> std::result::Result<U, String>,
) -> std::result::Result<Vec<Option<U>>, String> {
    values
        .iter()
        .map(|value| value.as_ref().map(&mut f).transpose())
        .collect()
}

fn to_timestamp(data: &ColumnData) -> std::result::Result<Vec<Option<NaiveDateTime>>, String> {
    match data {
        ColumnData::Utf8(values) => try_map(values, |s| {
            parse_timestamp(s).ok_or_else(|| format!("unable to parse '{}' as a datetime", s))
        }),
        ColumnData::Timestamp(values) => Ok(values.clone()),
        ColumnData::Date(values) => Ok(values.iter().map(|d| d.map(|d| d.and_time(NaiveTime::MIN))).collect()),
        other => Err(format!("cannot convert {} values to a datetime", other.data_type())),
    }
}

fn to_date(data: &ColumnData) -> std::result::Result<Vec<Option<NaiveDate>>, String> {
    match data {
        ColumnData::Date(values) => Ok(values.clone()),
        other => to_timestamp(other)
            .map(|stamps| stamps.into_iter().map(|ts| ts.map(|ts| ts.date())).collect()),
    }
}

fn to_int(data: &ColumnData) -> std::result::Result<Vec<Option<i64>>, String> {
    match data {
        ColumnData::Int64(values) => Ok(values.clone()),
        ColumnData::Float64(values) => try_map(values, |&v| {
            if v.is_finite() && v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
                Ok(v as i64)
            } else {
                Err(format!("cannot safely cast non-integral value {} to int", v))
            }
        }),
        ColumnData::Boolean(values) => Ok(values.iter().map(|b| b.map(i64::from)).collect()),
        ColumnData::Utf8(values) => try_map(values, |s| {
            s.trim()
                .parse::<i64>()
                .map_err(|_| format!("invalid literal for int: '{}'", s))
        }),
        other => Err(format!("cannot convert {} values to int", other.data_type())),
    }
}

fn to_float(data: &ColumnData) -> std::result::Result<Vec<Option<f64>>, String> {
    match data {
        ColumnData::Float64(values) => Ok(values.clone()),
        ColumnData::Int64(values) => Ok(values.iter().map(|v| v.map(|v| v as f64)).collect()),
        ColumnData::Boolean(values) => {
            Ok(values.iter().map(|b| b.map(|b| if b { 1.0 } else { 0.0 })).collect())
        },
        ColumnData::Utf8(values) => try_map(values, |s| {
            s.trim()
                .parse::<f64>()
                .map_err(|_| format!("could not convert string to float: '{}'", s))
        }),
        other => Err(format!("cannot convert {} values to float", other.data_type())),
    }
}

/// NaN has no text form and becomes a null.
fn to_text(data: &ColumnData) -> ColumnData {
    match data {
        ColumnData::Utf8(values) => ColumnData::Utf8(values.clone()),
        ColumnData::Float64(values) => ColumnData::Utf8(
            values
                .iter()
                .map(|v| v.filter(|v| !v.is_nan()).map(format_float))
                .collect(),
        ),
        other => ColumnData::Utf8((0..other.len()).map(|row| other.display_value(row)).collect()),
    }
}

/// Parse a date or datetime string in any accepted layout. Offsets are
/// converted to UTC.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.naive_utc());
    }
    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(text, format) {
            return Some(parsed.naive_utc());
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date.and_time(NaiveTime::MIN));
        }
    }
    if text.len() == 8 && text.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y%m%d") {
            return Some(date.and_time(NaiveTime::MIN));
        }
    }
    None
}
