//! CSV ingestion
//!
//! The whole object is loaded into memory, transcoded to UTF-8 and parsed
//! with a header row. Cells matching a missing-value token become nulls and
//! each column gets the narrowest type that fits every remaining cell.

use anyhow::{anyhow, Context};
use tracing::{debug, instrument};

use crate::error::{IngestError, Result};
use crate::metadata::ReadOptions;
use crate::store::{ObjectLocation, ObjectStore};
use crate::table::{Column, ColumnData, Table};

/// Cells read as missing values
pub const NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

pub fn is_na(cell: &str) -> bool {
    NA_VALUES.contains(&cell)
}

/// Fetch `location` from `store` and parse it
#[instrument(skip(store, location, options), fields(location = %location))]
pub async fn read_table(
    store: &dyn ObjectStore,
    location: &ObjectLocation,
    options: &ReadOptions,
) -> Result<Table> {
    let bytes = store
        .get(location)
        .await
        .map_err(|e| IngestError::source_read(location, &e))?;

    let table = parse_delimited(&bytes, options).map_err(|e| IngestError::source_read(location, &e))?;

    debug!(
        rows = table.num_rows(),
        columns = table.num_columns(),
        bytes = bytes.len(),
        "Parsed csv"
    );
    Ok(table)
}

/// Parse delimited text with a header row
pub fn parse_delimited(bytes: &[u8], options: &ReadOptions) -> anyhow::Result<Table> {
    let (text, used_encoding, had_errors) = options.encoding.decode(bytes);
    if had_errors {
        return Err(anyhow!("File is not valid {}", used_encoding.name()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.separator)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read header row")?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.is_empty() || (headers.len() == 1 && headers[0].is_empty()) {
        return Ok(Table::new());
    }

    for (idx, name) in headers.iter().enumerate() {
        if headers[..idx].contains(name) {
            return Err(anyhow!("Duplicate column name in header: {:?}", name));
        }
    }

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to parse record {}", idx + 1))?;
        if record.len() != headers.len() {
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            return Err(anyhow!(
                "Expected {} fields on line {}, saw {}",
                headers.len(),
                line,
                record.len()
            ));
        }
        for (column, cell) in cells.iter_mut().zip(record.iter()) {
            column.push(if is_na(cell) { None } else { Some(cell.to_string()) });
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, values)| Column::new(name, infer_column(values, options.decimal_char)))
        .collect();
    Ok(Table::from_columns(columns)?)
}

/// Pick Int64, Float64, Boolean or Utf8 for a column of raw cells
pub fn infer_column(values: Vec<Option<String>>, decimal_char: char) -> ColumnData {
    if values.iter().all(Option::is_none) {
        return ColumnData::Utf8(values);
    }

    if let Some(ints) = parse_all(&values, parse_int) {
        return ColumnData::Int64(ints);
    }
    if let Some(floats) = parse_all(&values, |s| parse_float(s, decimal_char)) {
        return ColumnData::Float64(floats);
    }
    if let Some(bools) = parse_all(&values, parse_bool) {
        return ColumnData::Boolean(bools);
    }
    ColumnData::Utf8(values)
}

fn parse_all<T>(values: &[Option<String>], parse: impl Fn(&str) -> Option<T>) -> Option<Vec<Option<T>>> {
    values
        .iter()
        .map(|value| match value {
            None => Some(None),
            Some(text) => parse(text).map(Some),
        })
        .collect()
}

fn parse_int(cell: &str) -> Option<i64> {
    let trimmed = cell.trim();
    let digits = trimmed.strip_prefix(['+', '-']).unwrap_or(trimmed);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse().ok()
}

/// Parse a float whose decimal mark is `decimal_char`
pub fn parse_float(cell: &str, decimal_char: char) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = if decimal_char == '.' {
        trimmed.to_string()
    } else {
        if trimmed.contains('.') {
            return None;
        }
        trimmed.replace(decimal_char, ".")
    };
    let mantissa_ok = normalized
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | 'e' | 'E'));
    let special = matches!(
        normalized.to_ascii_lowercase().trim_start_matches(['+', '-']),
        "inf" | "infinity"
    );
    if !mantissa_ok && !special {
        return None;
    }
    normalized.parse().ok()
}

fn parse_bool(cell: &str) -> Option<bool> {
    match cell.trim() {
        "True" | "TRUE" | "true" => Some(true),
        "False" | "FALSE" | "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::metadata::lookup_encoding;
    use crate::store::LocalFileStore;
    use tempfile::TempDir;

    fn utf8(values: &[Option<&str>]) -> ColumnData {
        ColumnData::Utf8(values.iter().map(|v| v.map(str::to_string)).collect())
    }

    #[test]
    fn test_infers_types() {
        let csv = b"ObservationDate,WindSpeed,Gust,Calm,Station\n\
                    2016-02-01,3,1.5,True,north\n\
                    2016-02-01,5,NA,false,\n\
                    2016-02-02,,2,TRUE,south\n";
        let table = parse_delimited(csv, &ReadOptions::default()).unwrap();

        assert_eq!(table.num_rows(), 3);
        assert_eq!(
            table.column_names(),
            vec!["ObservationDate", "WindSpeed", "Gust", "Calm", "Station"]
        );
        assert_eq!(
            table.column("ObservationDate").unwrap().data,
            utf8(&[Some("2016-02-01"), Some("2016-02-01"), Some("2016-02-02")])
        );
        assert_eq!(
            table.column("WindSpeed").unwrap().data,
            ColumnData::Int64(vec![Some(3), Some(5), None])
        );
        assert_eq!(
            table.column("Gust").unwrap().data,
            ColumnData::Float64(vec![Some(1.5), None, Some(2.0)])
        );
        assert_eq!(
            table.column("Calm").unwrap().data,
            ColumnData::Boolean(vec![Some(true), Some(false), Some(true)])
        );
        assert_eq!(
            table.column("Station").unwrap().data,
            utf8(&[Some("north"), None, Some("south")])
        );
    }

    #[test]
    fn test_separator_and_decimal_char() {
        let options = ReadOptions {
            separator: b';',
            decimal_char: ',',
            ..ReadOptions::default()
        };
        let csv = "region;rate;code\nnorth;1,25;1.2.3\nsouth;3;4\n";
        let table = parse_delimited(csv.as_bytes(), &options).unwrap();
        assert_eq!(
            table.column("rate").unwrap().data,
            ColumnData::Float64(vec![Some(1.25), Some(3.0)])
        );
        assert_eq!(
            table.column("code").unwrap().data,
            utf8(&[Some("1.2.3"), Some("4")])
        );
    }

    #[test]
    fn test_latin1() {
        let options = ReadOptions {
            encoding: lookup_encoding("latin1").unwrap(),
            ..ReadOptions::default()
        };
        // "café" in ISO-8859-1
        let bytes = b"name\ncaf\xe9\n";
        let table = parse_delimited(bytes, &options).unwrap();
        assert_eq!(table.column("name").unwrap().data, utf8(&[Some("café")]));
    }

    #[test]
    fn test_invalid_utf8_is_an_error() {
        let err = parse_delimited(b"name\ncaf\xe9\n", &ReadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn test_quoted_fields() {
        let csv = b"city,note\n\"Paris, FR\",\"said \"\"hi\"\"\"\n";
        let table = parse_delimited(csv, &ReadOptions::default()).unwrap();
        assert_eq!(table.column("city").unwrap().data, utf8(&[Some("Paris, FR")]));
        assert_eq!(table.column("note").unwrap().data, utf8(&[Some("said \"hi\"")]));
    }

    #[test]
    fn test_quoted_empty_cell_is_a_null_row() {
        let table = parse_delimited(b"a\n\"\"\n1\n", &ReadOptions::default()).unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.column("a").unwrap().data, ColumnData::Int64(vec![None, Some(1)]));
    }

    #[test]
    fn test_header_only_and_empty() {
        let table = parse_delimited(b"a,b\n", &ReadOptions::default()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.column_names(), vec!["a", "b"]);

        let table = parse_delimited(b"", &ReadOptions::default()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.num_columns(), 0);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = parse_delimited(b"a,b\n1,2\n3\n", &ReadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("Expected 2 fields"), "{err}");

        let err = parse_delimited(b"a,b\n1,2,3\n", &ReadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("Expected 2 fields"), "{err}");
    }

    #[test]
    fn test_duplicate_headers_rejected() {
        let err = parse_delimited(b"a,a\n1,2\n", &ReadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("Duplicate column"), "{err}");
    }

    #[test]
    fn test_all_missing_column_is_text() {
        let table = parse_delimited(b"a,b\n1,\n2,NULL\n", &ReadOptions::default()).unwrap();
        assert_eq!(table.column("b").unwrap().data, utf8(&[None, None]));
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float(" 2.5 ", '.'), Some(2.5));
        assert_eq!(parse_float("1e3", '.'), Some(1000.0));
        assert_eq!(parse_float("-inf", '.'), Some(f64::NEG_INFINITY));
        assert_eq!(parse_float("1,5", ','), Some(1.5));
        assert_eq!(parse_float("1.5", ','), None);
        assert_eq!(parse_float("2016-02-01", '.'), None);
        assert_eq!(parse_float("abc", '.'), None);
    }

    #[tokio::test]
    async fn test_read_table_reports_location() {
        let dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(dir.path());
        let location = ObjectLocation::new("raw", "csv_to_parquet/weather/missing.csv");

        let err = read_table(&store, &location, &ReadOptions::default())
            .await
            .unwrap_err();
        match err {
            IngestError::SourceRead { location: loc, .. } => {
                assert_eq!(loc, "s3://raw/csv_to_parquet/weather/missing.csv")
            },
            other => panic!("unexpected error: {other}"),
        }
    }
}
