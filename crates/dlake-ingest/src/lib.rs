//! CSV to Parquet ingestion
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Turns CSV objects dropped into a landing bucket into partitioned Parquet
//! tables registered in a catalog.
//!
//! # Overview
//!
//! For every object named by a bucket notification the pipeline:
//!
//! 1. resolves the object's user metadata into typed settings ([`metadata`])
//! 2. reads the delimited file into an in-memory [`table::Table`] ([`reader`])
//! 3. applies the requested column casts ([`cast`])
//! 4. uppercases text and adds lineage columns ([`enrich`])
//! 5. normalizes column names to snake_case ([`normalize`])
//! 6. writes Hive-partitioned Parquet and updates the catalog ([`writer`], [`catalog`])
//!
//! and reports the outcome on a notification channel ([`notify`]).
//!
//! # Example
//!
//! ```no_run
//! use dlake_ingest::config::RuntimeConfig;
//! use dlake_ingest::event::S3Event;
//! use dlake_ingest::pipeline::{CsvToParquetPipeline, InvocationContext};
//!
//! # async fn run(event: S3Event) -> anyhow::Result<()> {
//! let config = RuntimeConfig::from_env()?;
//! let pipeline = CsvToParquetPipeline::from_config(&config).await?;
//! let ctx = InvocationContext::new(config.notification_channel(None));
//! let report = pipeline.handle_event(&event, &ctx).await;
//! println!("{} objects loaded", report.loaded());
//! # Ok(())
//! # }
//! ```

pub mod cast;
pub mod catalog;
pub mod config;
pub mod enrich;
pub mod error;
pub mod event;
pub mod literal;
pub mod metadata;
pub mod normalize;
pub mod notify;
pub mod pipeline;
pub mod reader;
pub mod store;
pub mod table;
pub mod writer;

// Re-export commonly used types
pub use error::{ErrorKind, IngestError, Result};
pub use event::{S3Event, SourceObject};
pub use metadata::{ObjectMetadata, ResolvedMetadata};
pub use pipeline::{CsvToParquetPipeline, InvocationContext, InvocationReport};
pub use table::Table;
