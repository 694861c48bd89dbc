//! Error types for shared plumbing

use thiserror::Error;

/// Result type alias for plumbing operations
pub type Result<T> = std::result::Result<T, DlakeError>;

/// Errors raised outside the per-object pipeline (startup, configuration, IO)
#[derive(Error, Debug)]
pub enum DlakeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Missing required setting: {0}")]
    MissingSetting(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidSetting { key: String, value: String },
}

impl DlakeError {
    pub fn invalid_setting(key: impl Into<String>, value: impl Into<String>) -> Self {
        DlakeError::InvalidSetting {
            key: key.into(),
            value: value.into(),
        }
    }
}
