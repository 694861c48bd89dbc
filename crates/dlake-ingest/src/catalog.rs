//! Table catalog
//!
//! Maps `(database, table)` to the table's location, column schema,
//! partition keys and known partitions, so query engines can find the data.
//! [`ObjectStoreCatalog`] keeps one JSON definition per table next to the
//! data it describes.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::metadata::OutputMode;
use crate::store::{ObjectLocation, ObjectStore};

/// File format recorded for every table
pub const TABLE_FORMAT: &str = "parquet";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    /// Catalog type name (`string`, `bigint`, `double`, `boolean`, `date`, `timestamp`)
    #[serde(rename = "type")]
    pub data_type: String,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub database: String,
    pub name: String,
    pub location: String,
    pub format: String,
    pub compression: String,
    /// Data columns, in file order
    pub columns: Vec<ColumnDefinition>,
    pub partition_keys: Vec<ColumnDefinition>,
    /// Known partitions, as values in partition-key order
    pub partitions: BTreeSet<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Whether a write created the catalog entry or changed an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogChange {
    Created,
    Updated,
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_table(&self, database: &str, table: &str) -> Result<Option<TableDefinition>>;

    async fn put_table(&self, definition: &TableDefinition) -> Result<()>;
}

/// Combine the definition derived from a new batch with the stored one.
///
/// `overwrite` replaces the stored schema and partitions outright. Other
/// modes append unseen columns and union partitions; changing the type of a
/// known column or the partition keys is refused.
pub fn merge_definition(
    existing: Option<TableDefinition>,
    incoming: TableDefinition,
    mode: OutputMode,
) -> std::result::Result<(TableDefinition, CatalogChange), String> {
    let Some(mut merged) = existing else {
        return Ok((incoming, CatalogChange::Created));
    };

    if mode == OutputMode::Overwrite {
        let created_at = merged.created_at;
        return Ok((
            TableDefinition {
                created_at,
                ..incoming
            },
            CatalogChange::Updated,
        ));
    }

    if merged.partition_keys != incoming.partition_keys {
        return Err(format!(
            "partition keys {} do not match the table's {}",
            describe(&incoming.partition_keys),
            describe(&merged.partition_keys)
        ));
    }

    for column in incoming.columns {
        match merged.columns.iter().find(|c| c.name == column.name) {
            Some(known) if known.data_type != column.data_type => {
                return Err(format!(
                    "column {} has type {} but the table has {}",
                    column.name, column.data_type, known.data_type
                ));
            },
            Some(_) => {},
            None => merged.columns.push(column),
        }
    }

    merged.partitions.extend(incoming.partitions);
    merged.location = incoming.location;
    merged.compression = incoming.compression;
    merged.updated_at = incoming.updated_at;
    Ok((merged, CatalogChange::Updated))
}

fn describe(columns: &[ColumnDefinition]) -> String {
    let parts: Vec<String> = columns
        .iter()
        .map(|c| format!("{} {}", c.name, c.data_type))
        .collect();
    format!("[{}]", parts.join(", "))
}

/// Catalog kept as JSON documents at `{root}/_catalog/{database}/{table}.json`
pub struct ObjectStoreCatalog {
    store: Arc<dyn ObjectStore>,
    root: ObjectLocation,
}

impl ObjectStoreCatalog {
    pub fn new(store: Arc<dyn ObjectStore>, root: ObjectLocation) -> Self {
        Self { store, root }
    }

    pub fn definition_location(&self, database: &str, table: &str) -> ObjectLocation {
        self.root
            .join(&format!("_catalog/{}/{}.json", database, table))
    }
}

#[async_trait]
impl Catalog for ObjectStoreCatalog {
    async fn get_table(&self, database: &str, table: &str) -> Result<Option<TableDefinition>> {
        let location = self.definition_location(database, table);
        let Some(data) = self.store.get_if_exists(&location).await? else {
            return Ok(None);
        };
        let definition = serde_json::from_slice(&data)
            .with_context(|| format!("Failed to parse table definition {}", location))?;
        Ok(Some(definition))
    }

    async fn put_table(&self, definition: &TableDefinition) -> Result<()> {
        let location = self.definition_location(&definition.database, &definition.name);
        let data = serde_json::to_vec_pretty(definition)?;
        self.store
            .put(&location, data, Some("application/json"))
            .await
            .with_context(|| format!("Failed to store table definition {}", location))?;
        debug!(location = %location, "Stored table definition");
        Ok(())
    }
}
