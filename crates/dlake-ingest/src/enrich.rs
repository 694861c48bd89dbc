//! Record enrichment: uppercase text, lineage columns
//!
//! Missing values are already `None` by the time a table gets here; text
//! that survived the reader is data and is never turned back into a null.

use chrono::NaiveDate;
use tracing::debug;

use crate::error::Result;
use crate::table::{Column, ColumnData, Table};

/// Date the object was ingested
pub const CREATION_DATE_COLUMN: &str = "dl_creation_date";

/// Full location of the source object
pub const SOURCE_FILE_COLUMN: &str = "dl_source_file";

/// Enrich `table` in place.
///
/// Uppercasing (when enabled) runs before the lineage columns are added so
/// the source path keeps its original case.
pub fn enrich(
    table: &mut Table,
    source_path: &str,
    uppercase_strings: bool,
    ingestion_date: NaiveDate,
) -> Result<()> {
    if uppercase_strings {
        let columns = uppercase_text_columns(table);
        debug!(columns, "Uppercased text columns");
    }

    add_lineage_columns(table, source_path, ingestion_date)
}

/// Uppercase every value of every text column. Returns how many columns
/// were touched.
pub fn uppercase_text_columns(table: &mut Table) -> usize {
    let mut touched = 0;
    table.for_each_column_mut(|column| {
        if let ColumnData::Utf8(values) = &mut column.data {
            for value in values.iter_mut().flatten() {
                *value = value.to_uppercase();
            }
            touched += 1;
        }
    });
    touched
}

/// Append the ingestion date and source path to every row
pub fn add_lineage_columns(table: &mut Table, source_path: &str, ingestion_date: NaiveDate) -> Result<()> {
    let rows = table.num_rows();
    table.set_column(Column::new(
        CREATION_DATE_COLUMN,
        ColumnData::Date(vec![Some(ingestion_date); rows]),
    ))?;
    table.set_column(Column::new(
        SOURCE_FILE_COLUMN,
        ColumnData::Utf8(vec![Some(source_path.to_string()); rows]),
    ))?;
    Ok(())
}
