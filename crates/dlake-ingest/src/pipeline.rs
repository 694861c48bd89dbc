//! Per-event orchestration
//!
//! Each source object named by an event runs through
//! resolve -> read -> cast -> enrich -> normalize -> write, one after the
//! other in event order. A failing object is reported on the notification
//! channel and the batch moves on; the caller decides what to do with the
//! final [`InvocationReport`].

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};

use crate::catalog::{Catalog, ObjectStoreCatalog};
use crate::cast::cast;
use crate::config::{ExecutionMode, RuntimeConfig};
use crate::enrich::enrich;
use crate::error::{ErrorKind, IngestError};
use crate::event::{S3Event, SourceObject};
use crate::metadata::resolve;
use crate::normalize::normalize_columns;
use crate::notify::{HttpNotifier, LogNotifier, Notification, NotificationChannel, Notifier};
use crate::reader::read_table;
use crate::store::{LocalFileStore, ObjectStore, S3ObjectStore};
use crate::writer::{PartitionedWriter, WriteRequest, WriteResult, WriteTarget};

/// Values fixed for the whole invocation
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub channel: Option<NotificationChannel>,
    /// Written to `dl_creation_date` on every row of the invocation
    pub ingestion_date: NaiveDate,
}

impl InvocationContext {
    pub fn new(channel: Option<NotificationChannel>) -> Self {
        Self {
            channel,
            ingestion_date: Utc::now().date_naive(),
        }
    }

    pub fn with_ingestion_date(mut self, date: NaiveDate) -> Self {
        self.ingestion_date = date;
        self
    }
}

/// Pipeline step an object failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Metadata,
    Read,
    Cast,
    Enrich,
    Write,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ObjectStatus {
    Loaded(WriteResult),
    /// No rows; nothing was written or reported
    Empty,
    Failed {
        stage: Stage,
        kind: ErrorKind,
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectOutcome {
    pub source: SourceObject,
    #[serde(flatten)]
    pub status: ObjectStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InvocationReport {
    pub objects: Vec<ObjectOutcome>,
}

impl InvocationReport {
    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ObjectOutcome> {
        self.objects
            .iter()
            .filter(|o| matches!(o.status, ObjectStatus::Failed { .. }))
    }

    pub fn loaded(&self) -> usize {
        self.objects
            .iter()
            .filter(|o| matches!(o.status, ObjectStatus::Loaded(_)))
            .count()
    }
}

pub struct CsvToParquetPipeline {
    store: Arc<dyn ObjectStore>,
    catalog: Arc<dyn Catalog>,
    notifier: Arc<dyn Notifier>,
    target: WriteTarget,
}

impl CsvToParquetPipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        catalog: Arc<dyn Catalog>,
        notifier: Arc<dyn Notifier>,
        target: WriteTarget,
    ) -> Self {
        Self {
            store,
            catalog,
            notifier,
            target,
        }
    }

    /// Wire up the store, catalog and notifier the configuration asks for
    pub async fn from_config(config: &RuntimeConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn ObjectStore> = match config.execution_mode {
            ExecutionMode::Cloud => Arc::new(S3ObjectStore::new(config.storage.clone()).await?),
            ExecutionMode::Local => Arc::new(LocalFileStore::new(config.local_data_dir.clone())),
        };

        let notifier: Arc<dyn Notifier> = match &config.notify_http_endpoint {
            Some(endpoint) => Arc::new(HttpNotifier::new(endpoint.clone())?),
            None => Arc::new(LogNotifier),
        };

        let target = config.write_target();
        let catalog = Arc::new(ObjectStoreCatalog::new(store.clone(), target.root.clone()));

        info!(
            mode = %config.execution_mode,
            store = store.name(),
            target = %target.root,
            database = %target.database,
            "Pipeline ready"
        );
        Ok(Self::new(store, catalog, notifier, target))
    }

    /// Process every object of `event`, in order
    pub async fn handle_event(&self, event: &S3Event, ctx: &InvocationContext) -> InvocationReport {
        let sources = event.source_objects();
        info!(records = event.records.len(), objects = sources.len(), "Handling event");

        let mut report = InvocationReport::default();
        for source in sources {
            let span = info_span!("object", path = %source.location, table = %source.target_table);
            let outcome = self.handle_object(source, ctx).instrument(span).await;
            report.objects.push(outcome);
        }

        info!(
            objects = report.objects.len(),
            loaded = report.loaded(),
            failed = report.failures().count(),
            "Event handled"
        );
        report
    }

    /// Process one object and report the result on the channel
    pub async fn handle_object(&self, source: SourceObject, ctx: &InvocationContext) -> ObjectOutcome {
        let status = match self.process(&source, ctx).await {
            Ok(Some(result)) => {
                info!(
                    rows = result.rows,
                    partitions = result.partitions.len(),
                    destination = %result.destination,
                    "Csv to parquet succeeded"
                );
                self.publish(ctx, &Notification::success(&source)).await;
                ObjectStatus::Loaded(result)
            },
            Ok(None) => {
                info!("No rows to load");
                ObjectStatus::Empty
            },
            Err((stage, err)) => {
                let detail = err.to_string();
                error!(stage = ?stage, kind = %err.kind(), error = %detail, "Csv to parquet failed");
                self.publish(ctx, &Notification::failure(&source, &detail)).await;
                ObjectStatus::Failed {
                    stage,
                    kind: err.kind(),
                    error: detail,
                }
            },
        };

        ObjectOutcome { source, status }
    }

    async fn process(
        &self,
        source: &SourceObject,
        ctx: &InvocationContext,
    ) -> Result<Option<WriteResult>, (Stage, IngestError)> {
        let path = source.path();

        let raw = self
            .store
            .head_metadata(&source.location)
            .await
            .map_err(|e| (Stage::Metadata, IngestError::source_read(&source.location, &e)))?;
        let resolved = resolve(&path, &raw).map_err(|e| (Stage::Metadata, e))?;
        info!(
            metadata_keys = raw.len(),
            partition_cols = ?resolved.partition_cols.columns(),
            casts = resolved.cast_schema.len(),
            compression = %resolved.compression,
            mode = %resolved.output_mode,
            "Metadata resolved"
        );

        let table = read_table(self.store.as_ref(), &source.location, &resolved.read)
            .await
            .map_err(|e| (Stage::Read, e))?;
        info!(rows = table.num_rows(), columns = table.num_columns(), "Csv read");
        if table.is_empty() {
            return Ok(None);
        }

        let mut table = cast(table, &resolved.cast_schema).map_err(|e| (Stage::Cast, e))?;

        enrich(&mut table, &path, resolved.uppercase_strings, ctx.ingestion_date)
            .map_err(|e| (Stage::Enrich, e))?;

        normalize_columns(&mut table);

        let writer = PartitionedWriter::new(self.store.as_ref(), self.catalog.as_ref(), &self.target);
        let request = WriteRequest {
            table_name: &source.target_table,
            partition_cols: &resolved.partition_cols,
            compression: resolved.compression,
            output_mode: resolved.output_mode,
            source_path: &path,
        };
        let result = writer
            .write(&table, &request)
            .await
            .map_err(|e| (Stage::Write, e))?;

        Ok(Some(result))
    }

    async fn publish(&self, ctx: &InvocationContext, notification: &Notification) {
        if let Err(e) = self.notifier.publish(ctx.channel.as_ref(), notification).await {
            warn!(error = %format!("{:#}", e), subject = %notification.subject, "Failed to publish notification");
        }
    }
}
