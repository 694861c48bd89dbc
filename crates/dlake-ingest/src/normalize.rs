//! Catalog-safe column names
//!
//! Names are snake-cased the same way for every table so that an analyst
//! can predict the column from the CSV header: separators become `_`,
//! CamelCase boundaries get an `_`, everything is lowercased and runs of
//! underscores collapse to one.

use std::sync::LazyLock;

use regex::Regex;

use crate::table::Table;

#[allow(clippy::expect_used)]
static CAPITALIZED_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.)([A-Z][a-z]+)").expect("valid regex"));

#[allow(clippy::expect_used)]
static LOWER_UPPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("valid regex"));

#[allow(clippy::expect_used)]
static UNDERSCORE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_{2,}").expect("valid regex"));

/// Normalize one column name.
///
/// ```
/// use dlake_ingest::normalize::normalize_name;
///
/// assert_eq!(normalize_name("ObservationDate"), "observation_date");
/// assert_eq!(normalize_name("Wind Speed"), "wind_speed");
/// assert_eq!(normalize_name("wind-speed.max"), "wind_speed_max");
/// ```
pub fn normalize_name(name: &str) -> String {
    let name = name.replace([' ', '-', '.'], "_");
    let name = CAPITALIZED_WORD.replace_all(&name, "${1}_${2}");
    let name = LOWER_UPPER.replace_all(&name, "${1}_${2}");
    let name = name.to_lowercase();
    UNDERSCORE_RUN.replace_all(&name, "_").into_owned()
}

/// Rename every column of `table` in place
pub fn normalize_columns(table: &mut Table) {
    table.rename_columns(normalize_name);
}
