use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{config::Credentials, primitives::ByteStream, Client};
use tracing::{debug, info, instrument};

use super::{config::StorageConfig, ObjectLocation, ObjectStore};
use crate::metadata::ObjectMetadata;

/// S3 (or any S3-compatible endpoint such as MinIO)
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub async fn new(config: StorageConfig) -> Result<Self> {
        debug!("Initializing storage with config: {:?}", config);

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some((access_key, secret_key)) = config.static_credentials() {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "dlake-storage",
            ));
        }
        let shared = loader.load().await;

        let mut s3_config_builder =
            aws_sdk_s3::config::Builder::from(&shared).force_path_style(config.path_style);
        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());

        info!(
            endpoint = config.endpoint.as_deref().unwrap_or("aws"),
            "Storage client initialized"
        );

        Ok(Self { client })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn name(&self) -> &'static str {
        "s3"
    }

    #[instrument(skip(self, location), fields(location = %location))]
    async fn head_metadata(&self, location: &ObjectLocation) -> Result<ObjectMetadata> {
        let response = self
            .client
            .head_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .with_context(|| format!("Failed to get metadata from S3: {}", location))?;

        let metadata = response
            .metadata()
            .map(|m| m.iter().collect::<ObjectMetadata>())
            .unwrap_or_default();

        debug!(keys = metadata.len(), "Fetched object metadata");
        Ok(metadata)
    }

    #[instrument(skip(self, location), fields(location = %location))]
    async fn get(&self, location: &ObjectLocation) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .with_context(|| format!("Failed to download from S3: {}", location))?;

        let data = response
            .body
            .collect()
            .await
            .context("Failed to read S3 response body")?
            .into_bytes()
            .to_vec();

        debug!("Downloaded {} bytes from {}", data.len(), location);
        Ok(data)
    }

    #[instrument(skip(self, location), fields(location = %location))]
    async fn get_if_exists(&self, location: &ObjectLocation) -> Result<Option<Vec<u8>>> {
        let response = match self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    return Ok(None);
                }
                return Err(anyhow!(service_error))
                    .with_context(|| format!("Failed to download from S3: {}", location));
            },
        };

        let data = response
            .body
            .collect()
            .await
            .context("Failed to read S3 response body")?
            .into_bytes()
            .to_vec();
        Ok(Some(data))
    }

    #[instrument(skip(self, location, data), fields(location = %location, size = data.len()))]
    async fn put(
        &self,
        location: &ObjectLocation,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .body(ByteStream::from(data));

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        request
            .send()
            .await
            .with_context(|| format!("Failed to upload to S3: {}", location))?;

        debug!("Uploaded {}", location);
        Ok(())
    }

    #[instrument(skip(self, prefix), fields(prefix = %prefix))]
    async fn list(&self, prefix: &ObjectLocation) -> Result<Vec<ObjectLocation>> {
        let mut locations = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&prefix.bucket)
                .prefix(&prefix.key);
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .with_context(|| format!("Failed to list S3 objects under {}", prefix))?;

            locations.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key())
                    .map(|key| ObjectLocation::new(prefix.bucket.clone(), key)),
            );

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                },
                _ => break,
            }
        }

        locations.sort();
        Ok(locations)
    }

    #[instrument(skip(self, location), fields(location = %location))]
    async fn delete(&self, location: &ObjectLocation) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .with_context(|| format!("Failed to delete from S3: {}", location))?;

        debug!("Deleted {}", location);
        Ok(())
    }
}
