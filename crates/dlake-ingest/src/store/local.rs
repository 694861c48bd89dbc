use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::{ObjectLocation, ObjectStore};
use crate::metadata::ObjectMetadata;

/// Suffix of the JSON file holding an object's user metadata
pub const METADATA_SIDECAR_SUFFIX: &str = ".metadata.json";

/// Filesystem store rooted at a directory: `s3://bucket/key` lives at
/// `{root}/bucket/key`. Object metadata comes from an optional
/// `{key}.metadata.json` sidecar next to the object.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Filesystem path of `location`. Keys may not escape the root.
    pub fn path_for(&self, location: &ObjectLocation) -> Result<PathBuf> {
        let relative = Path::new(&location.bucket).join(&location.key);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(anyhow!("Invalid object location for local store: {}", location));
        }
        Ok(self.root.join(relative))
    }

    fn sidecar_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(METADATA_SIDECAR_SUFFIX);
        PathBuf::from(name)
    }

    /// Attach user metadata to an object, as an uploader would
    pub async fn put_metadata(&self, location: &ObjectLocation, metadata: &ObjectMetadata) -> Result<()> {
        let path = Self::sidecar_path(&self.path_for(location)?);
        let data = serde_json::to_vec_pretty(metadata)?;
        write_atomic(&path, &data).await
    }
}

async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, data)
        .await
        .with_context(|| format!("Failed to write file: {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to move file into place: {}", path.display()))?;
    Ok(())
}

#[async_trait]
impl ObjectStore for LocalFileStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn head_metadata(&self, location: &ObjectLocation) -> Result<ObjectMetadata> {
        let path = self.path_for(location)?;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(anyhow!("Object not found: {}", path.display()));
        }

        let sidecar = Self::sidecar_path(&path);
        match tokio::fs::read(&sidecar).await {
            Ok(data) => serde_json::from_slice(&data)
                .with_context(|| format!("Failed to parse metadata file: {}", sidecar.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ObjectMetadata::new()),
            Err(e) => Err(e).with_context(|| format!("Failed to read metadata file: {}", sidecar.display())),
        }
    }

    async fn get(&self, location: &ObjectLocation) -> Result<Vec<u8>> {
        let path = self.path_for(location)?;
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        debug!("Read {} bytes from {}", data.len(), path.display());
        Ok(data)
    }

    async fn get_if_exists(&self, location: &ObjectLocation) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(location)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read file: {}", path.display())),
        }
    }

    async fn put(
        &self,
        location: &ObjectLocation,
        data: Vec<u8>,
        _content_type: Option<&str>,
    ) -> Result<()> {
        let path = self.path_for(location)?;
        write_atomic(&path, &data).await?;
        debug!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(())
    }

    async fn list(&self, prefix: &ObjectLocation) -> Result<Vec<ObjectLocation>> {
        let bucket_root = self.path_for(&ObjectLocation::new(prefix.bucket.clone(), ""))?;
        let mut pending = vec![bucket_root.clone()];
        let mut locations = Vec::new();

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to list directory: {}", dir.display()))
                },
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&bucket_root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(&prefix.key) {
                    locations.push(ObjectLocation::new(prefix.bucket.clone(), key));
                }
            }
        }

        locations.sort();
        Ok(locations)
    }

    async fn delete(&self, location: &ObjectLocation) -> Result<()> {
        let path = self.path_for(location)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete file: {}", path.display())),
        }
    }
}
