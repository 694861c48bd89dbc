//! Runtime configuration
//!
//! Read once per process from the environment (and `.env`), validated, then
//! handed down as plain values.

use std::path::PathBuf;
use std::str::FromStr;

use dlake_common::{DlakeError, Result};
use serde::{Deserialize, Serialize};

use crate::notify::NotificationChannel;
use crate::store::{ObjectLocation, StorageConfig};
use crate::writer::WriteTarget;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default root directory of the local store.
pub const DEFAULT_LOCAL_DATA_DIR: &str = "./data";

/// Bucket used for the destination when running locally without one.
pub const DEFAULT_LOCAL_BUCKET: &str = "analytics";

/// Catalog database used when running locally without one.
pub const DEFAULT_LOCAL_DATABASE: &str = "local";

/// Where the pipeline runs. Decides which object store is built at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Cloud,
    #[default]
    Local,
}

impl FromStr for ExecutionMode {
    type Err = DlakeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cloud" | "aws" | "s3" => Ok(ExecutionMode::Cloud),
            "local" => Ok(ExecutionMode::Local),
            other => Err(DlakeError::invalid_setting("EXECUTION_MODE", other)),
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Cloud => write!(f, "cloud"),
            ExecutionMode::Local => write!(f, "local"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub execution_mode: ExecutionMode,
    pub target_bucket: Option<String>,
    /// Key prefix inside the target bucket, may be empty
    pub target_prefix: String,
    pub target_database: Option<String>,
    pub local_data_dir: PathBuf,
    pub sns_topic_name: Option<String>,
    pub sns_topic_arn: Option<String>,
    pub notify_http_endpoint: Option<String>,
    pub storage: StorageConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            execution_mode: ExecutionMode::default(),
            target_bucket: None,
            target_prefix: String::new(),
            target_database: None,
            local_data_dir: PathBuf::from(DEFAULT_LOCAL_DATA_DIR),
            sns_topic_name: None,
            sns_topic_arn: None,
            notify_http_endpoint: None,
            storage: StorageConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment and defaults
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let execution_mode = match var("EXECUTION_MODE") {
            Some(mode) => mode.parse()?,
            None => ExecutionMode::default(),
        };

        let config = RuntimeConfig {
            execution_mode,
            target_bucket: var("TARGET_S3_BUCKET"),
            target_prefix: var("TARGET_S3_PREFIX")
                .map(|p| p.trim_matches('/').to_string())
                .unwrap_or_default(),
            target_database: var("TARGET_GLUE_DATABASE"),
            local_data_dir: var("LOCAL_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCAL_DATA_DIR)),
            sns_topic_name: var("SNS_TOPIC_NAME"),
            sns_topic_arn: var("SNS_TOPIC_ARN"),
            notify_http_endpoint: var("NOTIFY_HTTP_ENDPOINT"),
            storage: StorageConfig::from_env(),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.execution_mode == ExecutionMode::Cloud {
            if self.target_bucket.is_none() {
                return Err(DlakeError::MissingSetting("TARGET_S3_BUCKET".to_string()));
            }
            if self.target_database.is_none() {
                return Err(DlakeError::MissingSetting("TARGET_GLUE_DATABASE".to_string()));
            }
        }

        if let Some(bucket) = &self.target_bucket {
            if bucket.contains('/') {
                return Err(DlakeError::invalid_setting("TARGET_S3_BUCKET", bucket));
            }
        }

        if let Some(endpoint) = &self.notify_http_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(DlakeError::invalid_setting("NOTIFY_HTTP_ENDPOINT", endpoint));
            }
        }

        if self.execution_mode == ExecutionMode::Cloud && self.sns_topic_arn.is_none() && self.sns_topic_name.is_none() {
            tracing::warn!("No notification topic configured - notifications carry no topic");
        }

        Ok(())
    }

    pub fn database(&self) -> &str {
        self.target_database.as_deref().unwrap_or(DEFAULT_LOCAL_DATABASE)
    }

    /// Root under which every table of the database is written
    pub fn write_target(&self) -> WriteTarget {
        let bucket = self.target_bucket.as_deref().unwrap_or(DEFAULT_LOCAL_BUCKET);
        WriteTarget::new(ObjectLocation::new(bucket, self.target_prefix.clone()), self.database())
    }

    /// Topic for this invocation: the explicit ARN when set, otherwise the
    /// topic name resolved against the invoked function's ARN.
    pub fn notification_channel(&self, function_arn: Option<&str>) -> Option<NotificationChannel> {
        if let Some(arn) = &self.sns_topic_arn {
            return Some(NotificationChannel::new(arn.clone()));
        }
        let topic = self.sns_topic_name.as_deref()?;
        NotificationChannel::from_function_arn(function_arn?, topic)
    }
}

fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "EXECUTION_MODE",
        "TARGET_S3_BUCKET",
        "TARGET_S3_PREFIX",
        "TARGET_GLUE_DATABASE",
        "LOCAL_DATA_DIR",
        "SNS_TOPIC_NAME",
        "SNS_TOPIC_ARN",
        "NOTIFY_HTTP_ENDPOINT",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_execution_mode_from_str() {
        assert_eq!("cloud".parse::<ExecutionMode>().unwrap(), ExecutionMode::Cloud);
        assert_eq!(" LOCAL ".parse::<ExecutionMode>().unwrap(), ExecutionMode::Local);
        assert!("lambda-ish".parse::<ExecutionMode>().is_err());
    }

    #[test]
    fn test_default_is_valid_local() {
        let config = RuntimeConfig::default();
        assert!(config.validate().is_ok());

        let target = config.write_target();
        assert_eq!(target.database, DEFAULT_LOCAL_DATABASE);
        assert_eq!(
            target.table_location("tbl_weather").to_string(),
            "s3://analytics/databases/local/tbl_weather/"
        );
    }

    #[test]
    fn test_cloud_requires_bucket_and_database() {
        let mut config = RuntimeConfig {
            execution_mode: ExecutionMode::Cloud,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DlakeError::MissingSetting(k)) if k == "TARGET_S3_BUCKET"));

        config.target_bucket = Some("lake".into());
        assert!(matches!(config.validate(), Err(DlakeError::MissingSetting(k)) if k == "TARGET_GLUE_DATABASE"));

        config.target_database = Some("analytics".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_notification_channel() {
        let arn = "arn:aws:lambda:eu-west-1:123456789012:function:csv-to-parquet";
        let mut config = RuntimeConfig {
            sns_topic_name: Some("datalake".into()),
            ..Default::default()
        };
        assert_eq!(
            config.notification_channel(Some(arn)).unwrap().topic_arn,
            "arn:aws:sns:eu-west-1:123456789012:datalake"
        );
        assert!(config.notification_channel(None).is_none());

        config.sns_topic_arn = Some("arn:aws:sns:us-east-1:1:explicit".into());
        assert_eq!(
            config.notification_channel(Some(arn)).unwrap().topic_arn,
            "arn:aws:sns:us-east-1:1:explicit"
        );
    }

    #[test]
    #[serial]
    fn test_from_env() {
        clear_env();
        std::env::set_var("EXECUTION_MODE", "cloud");
        std::env::set_var("TARGET_S3_BUCKET", "lake");
        std::env::set_var("TARGET_S3_PREFIX", "/curated/");
        std::env::set_var("TARGET_GLUE_DATABASE", "analytics");

        let config = RuntimeConfig::from_env().unwrap();
        assert_eq!(config.execution_mode, ExecutionMode::Cloud);
        assert_eq!(config.target_prefix, "curated");
        assert_eq!(
            config.write_target().table_location("tbl_weather").to_string(),
            "s3://lake/curated/databases/analytics/tbl_weather/"
        );

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_missing_database_in_cloud() {
        clear_env();
        std::env::set_var("EXECUTION_MODE", "cloud");
        std::env::set_var("TARGET_S3_BUCKET", "lake");

        assert!(RuntimeConfig::from_env().is_err());

        clear_env();
    }
}
