use serde::{Deserialize, Serialize};
use std::env;

/// S3 client settings.
///
/// Static keys are optional: when none are given the client uses the
/// default AWS provider chain, which is what a function runtime provides.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub path_style: bool,
}

impl StorageConfig {
    pub fn from_env() -> Self {
        Self {
            endpoint: non_empty_var("S3_ENDPOINT"),
            region: non_empty_var("S3_REGION").or_else(|| non_empty_var("AWS_REGION")),
            access_key: non_empty_var("S3_ACCESS_KEY").or_else(|| non_empty_var("AWS_ACCESS_KEY_ID")),
            secret_key: non_empty_var("S3_SECRET_KEY").or_else(|| non_empty_var("AWS_SECRET_ACCESS_KEY")),
            path_style: env::var("S3_PATH_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }

    pub fn for_minio(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            region: Some("us-east-1".to_string()),
            access_key: Some("minioadmin".to_string()),
            secret_key: Some("minioadmin".to_string()),
            path_style: true,
        }
    }

    /// Static credentials, when both halves are configured
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) => Some((access, secret)),
            _ => None,
        }
    }
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key.as_ref().map(|_| "***"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "***"))
            .field("path_style", &self.path_style)
            .finish()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_for_minio() {
        let config = StorageConfig::for_minio("http://localhost:9000");
        assert_eq!(config.endpoint, Some("http://localhost:9000".to_string()));
        assert!(config.path_style);
        assert_eq!(config.static_credentials(), Some(("minioadmin", "minioadmin")));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = StorageConfig::for_minio("http://localhost:9000");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("minioadmin"));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        env::set_var("S3_ENDPOINT", "http://localhost:9000");
        env::set_var("S3_PATH_STYLE", "true");
        env::remove_var("S3_ACCESS_KEY");
        env::set_var("S3_SECRET_KEY", "secret");

        let config = StorageConfig::from_env();
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:9000"));
        assert!(config.path_style);
        assert!(config.static_credentials().is_none());

        env::remove_var("S3_ENDPOINT");
        env::remove_var("S3_PATH_STYLE");
        env::remove_var("S3_SECRET_KEY");
    }
}
