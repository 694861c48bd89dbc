//! Data Lake Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared plumbing used by every data lake workspace member.
//!
//! # Overview
//!
//! - **Error Handling**: [`DlakeError`] and the [`Result`] alias for plumbing code
//! - **Logging**: environment-driven `tracing` subscriber setup
//! - **Checksums**: content digests used to derive stable object names
//!
//! # Example
//!
//! ```no_run
//! use dlake_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{DlakeError, Result};
