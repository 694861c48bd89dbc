//! Success / failure notifications
//!
//! Every processed object produces one message on the notification topic.
//! The topic is a plain value resolved once per invocation and handed to
//! the [`Notifier`] with each message.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::info;

use crate::event::SourceObject;

// ============================================================================
// Notification Constants
// ============================================================================

/// Longest subject the topic accepts
pub const MAX_SUBJECT_LEN: usize = 100;

/// Timeout for the HTTP transport
pub const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 10;

/// Topic that receives the notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationChannel {
    pub topic_arn: String,
}

impl NotificationChannel {
    pub fn new(topic_arn: impl Into<String>) -> Self {
        Self {
            topic_arn: topic_arn.into(),
        }
    }

    /// Topic `topic_name` in the region and account of the invoked function,
    /// taken from its ARN (`arn:aws:lambda:{region}:{account}:function:{name}`).
    pub fn from_function_arn(function_arn: &str, topic_name: &str) -> Option<Self> {
        let parts: Vec<&str> = function_arn.split(':').collect();
        let (partition, region, account) = match parts.as_slice() {
            ["arn", partition, _service, region, account, ..]
                if !region.is_empty() && !account.is_empty() =>
            {
                (*partition, *region, *account)
            },
            _ => return None,
        };
        Some(Self::new(format!(
            "arn:{}:sns:{}:{}:{}",
            partition, region, account, topic_name
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub subject: String,
    pub message: String,
}

impl Notification {
    pub fn success(source: &SourceObject) -> Self {
        Self {
            subject: subject(format!("SUCCESS - {} - Csv to parquet succeeded.", source.file_name())),
            message: format!(
                "The file {} was loaded successfully into S3 Analytics and is accessible via Athena on table {}.",
                source.path(),
                source.target_table
            ),
        }
    }

    pub fn failure(source: &SourceObject, detail: &str) -> Self {
        Self {
            subject: subject(format!("ERROR - {} - Csv to parquet failed.", source.file_name())),
            message: format!(
                "The file {} could not be loaded into S3 Analytics. Please check the logs for more details.\n\n Error:\n{}",
                source.path(),
                detail
            ),
        }
    }
}

fn subject(mut text: String) -> String {
    if text.chars().count() > MAX_SUBJECT_LEN {
        text = text.chars().take(MAX_SUBJECT_LEN - 3).collect::<String>() + "...";
    }
    text
}

/// Notification transport
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(
        &self,
        channel: Option<&NotificationChannel>,
        notification: &Notification,
    ) -> Result<()>;
}

/// Writes notifications to the log only
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn publish(
        &self,
        channel: Option<&NotificationChannel>,
        notification: &Notification,
    ) -> Result<()> {
        info!(
            topic = channel.map(|c| c.topic_arn.as_str()).unwrap_or("-"),
            subject = %notification.subject,
            message = %notification.message,
            "Notification"
        );
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct PublishRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    topic_arn: Option<&'a str>,
    subject: &'a str,
    message: &'a str,
}

/// Posts notifications as JSON to an HTTP endpoint (e.g. a topic bridge)
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: Client,
    endpoint: String,
}

impl HttpNotifier {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_NOTIFY_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn publish(
        &self,
        channel: Option<&NotificationChannel>,
        notification: &Notification,
    ) -> Result<()> {
        let request = PublishRequest {
            topic_arn: channel.map(|c| c.topic_arn.as_str()),
            subject: &notification.subject,
            message: &notification.message,
        };

        self.client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send notification to {}", self.endpoint))?
            .error_for_status()
            .with_context(|| format!("Notification endpoint {} rejected the message", self.endpoint))?;

        Ok(())
    }
}
