//! Error types for the rally time card core.
//!
//! Every fallible operation in the crate returns [`RallyError`] through the
//! [`Result`] alias. Most of these errors never reach the driver: the worker
//! swallows notification failures, the card store falls back to an empty card
//! on malformed state, and a missing channel peer simply means nobody listens.
//!
//! ## Error Categories
//!
//! - **Store Errors**: reading or writing the persisted card
//! - **Parse Errors**: malformed card files, wire messages or time strings
//! - **Model Errors**: out-of-range times and unknown checkpoints
//! - **Notification Errors**: permission denied or no notification backend
//! - **Config Errors**: unreadable or invalid configuration files
//!
//! ## Recovery
//!
//! ```rust
//! use rallycard::RallyError;
//!
//! let error = RallyError::notification_denied();
//! if error.is_recoverable() {
//!     println!("countdown keeps running without notifications");
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for rally card operations.
pub type Result<T, E = RallyError> = std::result::Result<T, E>;

/// Main error type for rally card operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RallyError {
    #[error("Card store error: {path}")]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Invalid time value {value} ms for {field}: expected 0..=86399999")]
    InvalidTime { field: String, value: i64 },

    #[error("Checkpoint {number} does not exist on this card")]
    UnknownCheckpoint { number: u32 },

    #[error("Broadcast channel '{channel}' is closed")]
    Channel { channel: String },

    #[error("Notification permission was denied")]
    NotificationDenied,

    #[error("Notifications are unavailable: {reason}")]
    NotificationUnavailable { reason: String },

    #[error("Failed to show notification '{title}'")]
    Notification {
        title: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Configuration error in {path}: {details}")]
    Config { path: PathBuf, details: String },
}

impl RallyError {
    /// Returns whether the system keeps working (in a degraded way) after this error.
    pub fn is_recoverable(&self) -> bool {
        match self {
            RallyError::Store { .. } => true,
            RallyError::Parse { .. } => true,
            RallyError::InvalidTime { .. } => true,
            RallyError::UnknownCheckpoint { .. } => true,
            RallyError::Channel { .. } => true,
            RallyError::NotificationDenied => true,
            RallyError::NotificationUnavailable { .. } => true,
            RallyError::Notification { .. } => true,
            RallyError::Config { .. } => false,
        }
    }

    /// Helper constructor for store errors with path context.
    pub fn store_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RallyError::Store { path: path.into(), source }
    }

    /// Helper constructor for parse errors.
    pub fn parse(context: impl Into<String>, details: impl Into<String>) -> Self {
        RallyError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for out-of-range time values.
    pub fn invalid_time(field: impl Into<String>, value: i64) -> Self {
        RallyError::InvalidTime { field: field.into(), value }
    }

    /// Helper constructor for a denied notification permission.
    pub fn notification_denied() -> Self {
        RallyError::NotificationDenied
    }

    /// Helper constructor for a missing notification backend.
    pub fn notification_unavailable(reason: impl Into<String>) -> Self {
        RallyError::NotificationUnavailable { reason: reason.into() }
    }

    /// Helper constructor for notification backend failures with source.
    pub fn notification_failed(
        title: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        RallyError::Notification { title: title.into(), source: Some(source) }
    }

    /// Helper constructor for configuration errors.
    pub fn config(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        RallyError::Config { path: path.into(), details: details.into() }
    }
}

impl From<serde_json::Error> for RallyError {
    fn from(err: serde_json::Error) -> Self {
        RallyError::Parse {
            context: "JSON".to_string(),
            details: format!("line {}, column {}: {}", err.line(), err.column(), err),
        }
    }
}
