//! Object storage
//!
//! The pipeline reads sources, writes partitions and keeps catalog entries
//! through one [`ObjectStore`] trait object, chosen once at startup:
//! [`S3ObjectStore`] in the cloud, [`LocalFileStore`] on a workstation.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::metadata::ObjectMetadata;

pub mod config;
pub mod local;
pub mod s3;

pub use config::StorageConfig;
pub use local::LocalFileStore;
pub use s3::S3ObjectStore;

/// Bucket + key. Keys ending in `/` denote prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parse `s3://bucket/key`
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix("s3://")
            .ok_or_else(|| anyhow!("Not an s3:// location: {}", uri))?;
        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(anyhow!("Missing bucket in location: {}", uri));
        }
        Ok(Self::new(bucket, key))
    }

    /// Append `suffix` to the key, inserting a `/` when needed
    pub fn join(&self, suffix: &str) -> Self {
        let suffix = suffix.trim_start_matches('/');
        let key = if self.key.is_empty() || self.key.ends_with('/') {
            format!("{}{}", self.key, suffix)
        } else {
            format!("{}/{}", self.key, suffix)
        };
        Self::new(self.bucket.clone(), key)
    }

    /// Last `/`-separated segment of the key
    pub fn file_name(&self) -> &str {
        self.key
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }
}

impl std::fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Storage operations the pipeline needs
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// User metadata attached to the object
    async fn head_metadata(&self, location: &ObjectLocation) -> Result<ObjectMetadata>;

    async fn get(&self, location: &ObjectLocation) -> Result<Vec<u8>>;

    /// Like [`get`](Self::get) but a missing object is `Ok(None)`
    async fn get_if_exists(&self, location: &ObjectLocation) -> Result<Option<Vec<u8>>>;

    async fn put(
        &self,
        location: &ObjectLocation,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<()>;

    /// Every object whose key starts with `prefix.key`, sorted by key
    async fn list(&self, prefix: &ObjectLocation) -> Result<Vec<ObjectLocation>>;

    /// Deleting a missing object succeeds
    async fn delete(&self, location: &ObjectLocation) -> Result<()>;

    /// Delete everything under `prefix`; returns the number of objects removed
    async fn delete_prefix(&self, prefix: &ObjectLocation) -> Result<usize> {
        let objects = self.list(prefix).await?;
        for object in &objects {
            self.delete(object).await?;
        }
        Ok(objects.len())
    }
}
