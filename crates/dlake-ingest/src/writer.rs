//! Partitioned Parquet output
//!
//! A table lands under `{root}/databases/{database}/{table}/` in Hive layout
//! (`col=value/` per partition column), one Parquet file per partition. The
//! file name is derived from the source path, so replaying the same source
//! rewrites the same objects with the same bytes; with the default
//! `overwrite_partitions` mode that makes re-delivered events harmless.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Date32Array, Float64Array, Int64Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType as ArrowType, Field, Schema, TimeUnit};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use chrono::Utc;
use dlake_common::checksum::stable_token;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression as ParquetCompression, GzipLevel, ZstdLevel};
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::{
    merge_definition, Catalog, CatalogChange, ColumnDefinition, TableDefinition, TABLE_FORMAT,
};
use crate::error::{IngestError, Result};
use crate::metadata::{Compression, OutputMode, PartitionSpec};
use crate::store::{ObjectLocation, ObjectStore};
use crate::table::{days_since_epoch, ColumnData, DataType, Table};

/// Directory value Hive uses for null partition values
pub const HIVE_DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// Hex chars of the source-path digest used in file names
const FILE_TOKEN_LEN: usize = 16;

/// Where tables are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteTarget {
    /// Bucket and optional key prefix
    pub root: ObjectLocation,
    pub database: String,
}

impl WriteTarget {
    pub fn new(root: ObjectLocation, database: impl Into<String>) -> Self {
        Self {
            root,
            database: database.into(),
        }
    }

    /// `{root}/databases/{database}/{table}/`
    pub fn table_location(&self, table: &str) -> ObjectLocation {
        self.root
            .join(&format!("databases/{}/{}/", self.database, table))
    }
}

/// One write of one table
#[derive(Debug, Clone, Copy)]
pub struct WriteRequest<'a> {
    pub table_name: &'a str,
    pub partition_cols: &'a PartitionSpec,
    pub compression: Compression,
    pub output_mode: OutputMode,
    /// Source object the rows came from; names the output files
    pub source_path: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct WriteResult {
    pub destination: String,
    /// Partition directories written, e.g. `observation_date=2016-02-01`
    pub partitions: Vec<String>,
    pub objects: Vec<String>,
    pub rows: usize,
    /// Objects removed before writing
    pub deleted: usize,
    pub catalog: CatalogChange,
}

pub struct PartitionedWriter<'a> {
    store: &'a dyn ObjectStore,
    catalog: &'a dyn Catalog,
    target: &'a WriteTarget,
}

impl<'a> PartitionedWriter<'a> {
    pub fn new(store: &'a dyn ObjectStore, catalog: &'a dyn Catalog, target: &'a WriteTarget) -> Self {
        Self {
            store,
            catalog,
            target,
        }
    }

    /// Write `table` and register it in the catalog.
    ///
    /// Everything that can be checked up front (column names, partition
    /// columns, catalog compatibility) is checked before any object is
    /// deleted or written.
    pub async fn write(&self, table: &Table, request: &WriteRequest<'_>) -> Result<WriteResult> {
        let destination = self.target.table_location(request.table_name);
        let fail = |reason: String| IngestError::write_failure(&destination, reason);

        let existing = self
            .catalog
            .get_table(&self.target.database, request.table_name)
            .await
            .map_err(|e| fail(format!("{:#}", e)))?;
        let table = type_null_columns(table, existing.as_ref())?;
        let table: &Table = &table;

        let names = table.column_names();
        for (idx, name) in names.iter().enumerate() {
            if names[..idx].contains(name) {
                return Err(fail(format!("duplicate column name {}", name)));
            }
        }

        let mut partition_idx = Vec::with_capacity(request.partition_cols.len());
        for column in request.partition_cols.columns() {
            let idx = table.column_index(column).ok_or_else(|| {
                fail(format!(
                    "partition column {} is not in the table (columns: {})",
                    column,
                    names.join(", ")
                ))
            })?;
            partition_idx.push(idx);
        }
        let data_idx: Vec<usize> = (0..table.num_columns())
            .filter(|idx| !partition_idx.contains(idx))
            .collect();
        if data_idx.is_empty() {
            return Err(fail("every column is a partition column".to_string()));
        }

        let groups = group_rows(table, &partition_idx);
        let partition_names: Vec<&str> = partition_idx
            .iter()
            .map(|&idx| table.columns()[idx].name.as_str())
            .collect();

        let now = Utc::now();
        let incoming = TableDefinition {
            database: self.target.database.clone(),
            name: request.table_name.to_string(),
            location: destination.to_string(),
            format: TABLE_FORMAT.to_string(),
            compression: request.compression.to_string(),
            columns: column_definitions(table, &data_idx),
            partition_keys: column_definitions(table, &partition_idx),
            partitions: groups.keys().filter(|v| !v.is_empty()).cloned().collect(),
            created_at: now,
            updated_at: now,
        };
        let (definition, change) = merge_definition(existing, incoming, request.output_mode).map_err(fail)?;

        let deleted = self
            .clear_destination(&destination, &partition_names, &groups, request.output_mode)
            .await
            .map_err(|e| fail(format!("{:#}", e)))?;

        let file_name = data_file_name(request.source_path, request.compression);
        let mut partitions = Vec::with_capacity(groups.len());
        let mut objects = Vec::with_capacity(groups.len());
        for (values, rows) in &groups {
            let partition_dir = partition_path(&partition_names, values);
            let subset = table.select(rows, &data_idx);
            let bytes = to_record_batch(&subset)
                .map_err(|e| fail(format!("failed to build record batch: {}", e)))
                .and_then(|batch| {
                    encode_parquet(&batch, request.compression)
                        .map_err(|e| fail(format!("failed to encode parquet: {}", e)))
                })?;

            let location = destination.join(&format!("{}{}", partition_dir, file_name));
            self.store
                .put(&location, bytes, Some("application/vnd.apache.parquet"))
                .await
                .map_err(|e| fail(format!("{:#}", e)))?;
            debug!(location = %location, rows = rows.len(), "Wrote partition");

            if !partition_dir.is_empty() {
                partitions.push(partition_dir.trim_end_matches('/').to_string());
            }
            objects.push(location.to_string());
        }

        self.catalog
            .put_table(&definition)
            .await
            .map_err(|e| fail(format!("{:#}", e)))?;

        info!(
            destination = %destination,
            partitions = partitions.len(),
            rows = table.num_rows(),
            catalog = ?change,
            "Wrote table"
        );

        Ok(WriteResult {
            destination: destination.to_string(),
            partitions,
            objects,
            rows: table.num_rows(),
            deleted,
            catalog: change,
        })
    }

    async fn clear_destination(
        &self,
        destination: &ObjectLocation,
        partition_names: &[&str],
        groups: &BTreeMap<Vec<String>, Vec<usize>>,
        mode: OutputMode,
    ) -> anyhow::Result<usize> {
        match mode {
            OutputMode::Append => Ok(0),
            OutputMode::Overwrite => self.store.delete_prefix(destination).await,
            OutputMode::OverwritePartitions if partition_names.is_empty() => {
                self.store.delete_prefix(destination).await
            },
            OutputMode::OverwritePartitions => {
                let mut deleted = 0;
                for values in groups.keys() {
                    let prefix = destination.join(&partition_path(partition_names, values));
                    deleted += self.store.delete_prefix(&prefix).await?;
                }
                Ok(deleted)
            },
        }
    }
}

/// A column with no values at all has no type of its own; it takes the type
/// the catalog already records for it.
fn type_null_columns<'t>(table: &'t Table, existing: Option<&TableDefinition>) -> Result<Cow<'t, Table>> {
    let mut typed = Cow::Borrowed(table);
    let Some(existing) = existing else {
        return Ok(typed);
    };

    for column in table.columns() {
        if column.data.null_count() != column.data.len() {
            continue;
        }
        let Some(data_type) = existing
            .columns
            .iter()
            .chain(&existing.partition_keys)
            .find(|c| c.name == column.name)
            .and_then(|c| DataType::from_catalog_type(&c.data_type))
        else {
            continue;
        };
        if data_type != column.data_type() {
            debug!(column = %column.name, data_type = %data_type, "Typed all-null column from the catalog");
            typed
                .to_mut()
                .replace_column_data(&column.name, ColumnData::nulls(data_type, column.data.len()))?;
        }
    }
    Ok(typed)
}

/// Rows grouped by their rendered partition values, in value order
fn group_rows(table: &Table, partition_idx: &[usize]) -> BTreeMap<Vec<String>, Vec<usize>> {
    let mut groups: BTreeMap<Vec<String>, Vec<usize>> = BTreeMap::new();
    for row in 0..table.num_rows() {
        let values = partition_idx
            .iter()
            .map(|&idx| partition_value(&table.columns()[idx].data, row))
            .collect();
        groups.entry(values).or_default().push(row);
    }
    groups
}

fn partition_value(data: &ColumnData, row: usize) -> String {
    data.display_value(row)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| HIVE_DEFAULT_PARTITION.to_string())
}

fn column_definitions(table: &Table, indices: &[usize]) -> Vec<ColumnDefinition> {
    indices
        .iter()
        .map(|&idx| {
            let column = &table.columns()[idx];
            ColumnDefinition::new(column.name.clone(), column.data_type().catalog_type())
        })
        .collect()
}

/// `col1=v1/col2=v2/`, or empty when unpartitioned
pub fn partition_path(names: &[&str], values: &[String]) -> String {
    names
        .iter()
        .zip(values)
        .map(|(name, value)| format!("{}={}/", escape_partition_value(name), escape_partition_value(value)))
        .collect()
}

/// Hive path escaping: control characters and `"#%'*/:=?\{[]^` plus DEL
/// become `%XX`.
pub fn escape_partition_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        let needs_escape = ch.is_ascii_control()
            || matches!(
                ch,
                '"' | '#' | '%' | '\'' | '*' | '/' | ':' | '=' | '?' | '\\' | '{' | '[' | ']' | '^'
            );
        if needs_escape {
            let _ = write!(escaped, "%{:02X}", ch as u32);
        } else {
            escaped.push(ch);
        }
    }
    escaped
}

/// `part-{token}.{codec}.parquet`
pub fn data_file_name(source_path: &str, compression: Compression) -> String {
    let token = stable_token(source_path, FILE_TOKEN_LEN);
    match compression.file_infix() {
        Some(infix) => format!("part-{}.{}.parquet", token, infix),
        None => format!("part-{}.parquet", token),
    }
}

fn arrow_type(data_type: DataType) -> ArrowType {
    match data_type {
        DataType::Utf8 => ArrowType::Utf8,
        DataType::Int64 => ArrowType::Int64,
        DataType::Float64 => ArrowType::Float64,
        DataType::Boolean => ArrowType::Boolean,
        DataType::Date => ArrowType::Date32,
        DataType::Timestamp => ArrowType::Timestamp(TimeUnit::Microsecond, None),
    }
}

fn to_array(data: &ColumnData) -> ArrayRef {
    match data {
        ColumnData::Utf8(values) => Arc::new(StringArray::from(
            values.iter().map(|v| v.as_deref()).collect::<Vec<_>>(),
        )),
        ColumnData::Int64(values) => Arc::new(Int64Array::from(values.clone())),
        ColumnData::Float64(values) => Arc::new(Float64Array::from(values.clone())),
        ColumnData::Boolean(values) => Arc::new(BooleanArray::from(values.clone())),
        ColumnData::Date(values) => Arc::new(Date32Array::from(
            values.iter().map(|d| d.map(days_since_epoch)).collect::<Vec<_>>(),
        )),
        ColumnData::Timestamp(values) => Arc::new(TimestampMicrosecondArray::from(
            values
                .iter()
                .map(|ts| ts.map(|ts| ts.and_utc().timestamp_micros()))
                .collect::<Vec<_>>(),
        )),
    }
}

/// Arrow view of `table`; every field is nullable
pub fn to_record_batch(table: &Table) -> std::result::Result<RecordBatch, ArrowError> {
    let fields: Vec<Field> = table
        .columns()
        .iter()
        .map(|c| Field::new(c.name.clone(), arrow_type(c.data_type()), true))
        .collect();
    let arrays: Vec<ArrayRef> = table.columns().iter().map(|c| to_array(&c.data)).collect();
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
}

fn parquet_codec(compression: Compression) -> ParquetCompression {
    match compression {
        Compression::Snappy => ParquetCompression::SNAPPY,
        Compression::Gzip => ParquetCompression::GZIP(GzipLevel::default()),
        Compression::Zstd => ParquetCompression::ZSTD(ZstdLevel::default()),
        Compression::Uncompressed => ParquetCompression::UNCOMPRESSED,
    }
}

/// Single-file Parquet encoding of `batch`
pub fn encode_parquet(batch: &RecordBatch, compression: Compression) -> std::result::Result<Vec<u8>, ParquetError> {
    let props = WriterProperties::builder()
        .set_compression(parquet_codec(compression))
        .build();

    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(buf)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::ObjectStoreCatalog;
    use crate::store::LocalFileStore;
    use crate::table::Column;
    use bytes::Bytes;
    use chrono::NaiveDate;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::TempDir;

    const SOURCE: &str = "s3://raw/csv_to_parquet/weather/weather.csv";

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn weather() -> Table {
        Table::from_columns(vec![
            Column::new(
                "observation_date",
                ColumnData::Date(vec![Some(ymd(2016, 2, 1)), Some(ymd(2016, 2, 1)), Some(ymd(2016, 2, 2))]),
            ),
            Column::new("wind_speed", ColumnData::Int64(vec![Some(3), Some(5), None])),
            Column::new(
                "region",
                ColumnData::Utf8(vec![Some("NORTH".into()), None, Some("SOUTH".into())]),
            ),
        ])
        .unwrap()
    }

    struct Fixture {
        _dir: TempDir,
        store: Arc<dyn ObjectStore>,
        catalog: ObjectStoreCatalog,
        target: WriteTarget,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalFileStore::new(dir.path()));
        let root = ObjectLocation::new("lake", "");
        Fixture {
            catalog: ObjectStoreCatalog::new(store.clone(), root.clone()),
            target: WriteTarget::new(root, "analytics"),
            store,
            _dir: dir,
        }
    }

    fn request<'a>(partition_cols: &'a PartitionSpec, mode: OutputMode) -> WriteRequest<'a> {
        WriteRequest {
            table_name: "tbl_weather",
            partition_cols,
            compression: Compression::Snappy,
            output_mode: mode,
            source_path: SOURCE,
        }
    }

    fn read_back(bytes: Vec<u8>) -> RecordBatch {
        let reader = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(bytes))
            .unwrap()
            .build()
            .unwrap();
        let mut batches: Vec<RecordBatch> = reader.collect::<std::result::Result<_, _>>().unwrap();
        assert_eq!(batches.len(), 1);
        batches.remove(0)
    }

    #[test]
    fn test_escape_partition_value() {
        assert_eq!(escape_partition_value("2016-02-01"), "2016-02-01");
        assert_eq!(escape_partition_value("a/b=c"), "a%2Fb%3Dc");
        assert_eq!(escape_partition_value("50%"), "50%25");
        assert_eq!(escape_partition_value("tab\there"), "tab%09here");
        assert_eq!(escape_partition_value("café"), "café");
    }

    #[test]
    fn test_partition_path() {
        let names = ["region", "day"];
        let values = vec!["NORTH".to_string(), HIVE_DEFAULT_PARTITION.to_string()];
        assert_eq!(
            partition_path(&names, &values),
            "region=NORTH/day=__HIVE_DEFAULT_PARTITION__/"
        );
        assert_eq!(partition_path(&[], &[]), "");
    }

    #[test]
    fn test_data_file_name_is_stable() {
        let name = data_file_name(SOURCE, Compression::Snappy);
        assert!(name.starts_with("part-"));
        assert!(name.ends_with(".snappy.parquet"));
        assert_eq!(name, data_file_name(SOURCE, Compression::Snappy));
        assert_ne!(name, data_file_name("s3://raw/other.csv", Compression::Snappy));
        assert!(data_file_name(SOURCE, Compression::Uncompressed).ends_with(".parquet"));
        assert!(data_file_name(SOURCE, Compression::Gzip).ends_with(".gz.parquet"));
    }

    #[test]
    fn test_record_batch_types() {
        let batch = to_record_batch(&weather()).unwrap();
        let schema = batch.schema();
        assert_eq!(schema.field(0).data_type(), &ArrowType::Date32);
        assert_eq!(schema.field(1).data_type(), &ArrowType::Int64);
        assert_eq!(schema.field(2).data_type(), &ArrowType::Utf8);
        assert_eq!(batch.column(1).null_count(), 1);
    }

    #[tokio::test]
    async fn test_write_partitioned() {
        let fx = fixture();
        let writer = PartitionedWriter::new(fx.store.as_ref(), &fx.catalog, &fx.target);
        let spec = PartitionSpec::from_names(["observation_date"]);

        let result = writer
            .write(&weather(), &request(&spec, OutputMode::OverwritePartitions))
            .await
            .unwrap();

        assert_eq!(result.destination, "s3://lake/databases/analytics/tbl_weather/");
        assert_eq!(
            result.partitions,
            vec!["observation_date=2016-02-01", "observation_date=2016-02-02"]
        );
        assert_eq!(result.rows, 3);
        assert_eq!(result.catalog, CatalogChange::Created);

        let first = ObjectLocation::parse(&result.objects[0]).unwrap();
        let batch = read_back(fx.store.get(&first).await.unwrap());
        assert_eq!(batch.num_rows(), 2);
        // partition column lives in the path only
        assert!(batch.schema().field_with_name("observation_date").is_err());
        let speeds = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!((speeds.value(0), speeds.value(1)), (3, 5));

        let definition = fx.catalog.get_table("analytics", "tbl_weather").await.unwrap().unwrap();
        assert_eq!(definition.partition_keys, vec![ColumnDefinition::new("observation_date", "date")]);
        assert_eq!(
            definition.columns,
            vec![
                ColumnDefinition::new("wind_speed", "bigint"),
                ColumnDefinition::new("region", "string"),
            ]
        );
    }

    #[tokio::test]
    async fn test_overwrite_partitions_keeps_other_partitions() {
        let fx = fixture();
        let writer = PartitionedWriter::new(fx.store.as_ref(), &fx.catalog, &fx.target);
        let spec = PartitionSpec::from_names(["observation_date"]);

        writer
            .write(&weather(), &request(&spec, OutputMode::OverwritePartitions))
            .await
            .unwrap();

        // a different file touching only 2016-02-02
        let later = Table::from_columns(vec![
            Column::new("observation_date", ColumnData::Date(vec![Some(ymd(2016, 2, 2))])),
            Column::new("wind_speed", ColumnData::Int64(vec![Some(9)])),
            Column::new("region", ColumnData::Utf8(vec![Some("EAST".into())])),
        ])
        .unwrap();
        let mut req = request(&spec, OutputMode::OverwritePartitions);
        req.source_path = "s3://raw/csv_to_parquet/weather/later.csv";
        let result = writer.write(&later, &req).await.unwrap();
        assert_eq!(result.deleted, 1);
        assert_eq!(result.catalog, CatalogChange::Updated);

        let table_prefix = fx.target.table_location("tbl_weather");
        let objects = fx.store.list(&table_prefix).await.unwrap();
        assert_eq!(objects.len(), 2);
        assert!(objects[0].key.contains("observation_date=2016-02-01/"));
        assert!(objects[1].key.ends_with(&data_file_name(req.source_path, Compression::Snappy)));

        let definition = fx.catalog.get_table("analytics", "tbl_weather").await.unwrap().unwrap();
        assert_eq!(definition.partitions.len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_unknown_partition_column_before_writing() {
        let fx = fixture();
        let writer = PartitionedWriter::new(fx.store.as_ref(), &fx.catalog, &fx.target);
        let spec = PartitionSpec::from_names(["country"]);

        let err = writer
            .write(&weather(), &request(&spec, OutputMode::OverwritePartitions))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::WriteFailure { .. }));
        assert!(err.to_string().contains("country"));

        let written = fx.store.list(&ObjectLocation::new("lake", "")).await.unwrap();
        assert!(written.is_empty());
    }

    #[tokio::test]
    async fn test_unpartitioned_overwrite() {
        let fx = fixture();
        let writer = PartitionedWriter::new(fx.store.as_ref(), &fx.catalog, &fx.target);
        let spec = PartitionSpec::none();

        let mut req = request(&spec, OutputMode::Append);
        writer.write(&weather(), &req).await.unwrap();
        req.source_path = "s3://raw/csv_to_parquet/weather/second.csv";
        writer.write(&weather(), &req).await.unwrap();

        let table_prefix = fx.target.table_location("tbl_weather");
        assert_eq!(fx.store.list(&table_prefix).await.unwrap().len(), 2);

        req.output_mode = OutputMode::OverwritePartitions;
        let result = writer.write(&weather(), &req).await.unwrap();
        assert_eq!(result.deleted, 2);
        assert!(result.partitions.is_empty());
        assert_eq!(fx.store.list(&table_prefix).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_type_conflict_is_a_write_failure() {
        let fx = fixture();
        let writer = PartitionedWriter::new(fx.store.as_ref(), &fx.catalog, &fx.target);
        let spec = PartitionSpec::none();
        writer.write(&weather(), &request(&spec, OutputMode::Append)).await.unwrap();

        let conflicting = Table::from_columns(vec![Column::new(
            "wind_speed",
            ColumnData::Utf8(vec![Some("fast".into())]),
        )])
        .unwrap();
        let err = writer
            .write(&conflicting, &request(&spec, OutputMode::Append))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("wind_speed"), "{err}");
    }

    #[tokio::test]
    async fn test_empty_column_takes_catalog_type() {
        use arrow::array::Array;

        let fx = fixture();
        let writer = PartitionedWriter::new(fx.store.as_ref(), &fx.catalog, &fx.target);
        let spec = PartitionSpec::from_names(["observation_date"]);
        writer
            .write(&weather(), &request(&spec, OutputMode::OverwritePartitions))
            .await
            .unwrap();

        // a later file where every wind_speed cell is empty reads as text
        let later = Table::from_columns(vec![
            Column::new("observation_date", ColumnData::Date(vec![Some(ymd(2016, 2, 3))])),
            Column::new("wind_speed", ColumnData::Utf8(vec![None])),
            Column::new("region", ColumnData::Utf8(vec![Some("EAST".into())])),
        ])
        .unwrap();
        let result = writer
            .write(&later, &request(&spec, OutputMode::OverwritePartitions))
            .await
            .unwrap();
        assert_eq!(result.catalog, CatalogChange::Updated);

        let batch = read_back(fx.store.get(&ObjectLocation::parse(&result.objects[0]).unwrap()).await.unwrap());
        let schema = batch.schema();
        assert_eq!(
            schema.field_with_name("wind_speed").unwrap().data_type(),
            &ArrowType::Int64
        );
        assert!(batch.column(0).is_null(0));

        let definition = fx.catalog.get_table("analytics", "tbl_weather").await.unwrap().unwrap();
        assert_eq!(definition.columns[0], ColumnDefinition::new("wind_speed", "bigint"));
    }

    #[tokio::test]
    async fn test_empty_column_without_catalog_entry_stays_text() {
        let fx = fixture();
        let writer = PartitionedWriter::new(fx.store.as_ref(), &fx.catalog, &fx.target);
        let spec = PartitionSpec::none();
        let table = Table::from_columns(vec![
            Column::new("wind_speed", ColumnData::Utf8(vec![None, None])),
            Column::new("region", ColumnData::Utf8(vec![Some("EAST".into()), None])),
        ])
        .unwrap();
        writer.write(&table, &request(&spec, OutputMode::Append)).await.unwrap();

        let definition = fx.catalog.get_table("analytics", "tbl_weather").await.unwrap().unwrap();
        assert_eq!(definition.columns[0], ColumnDefinition::new("wind_speed", "string"));
    }
}
