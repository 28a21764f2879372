//! Error types for the intake bot.

use std::time::Duration;

/// Error from handling one inbound update.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// The dispatch task panicked or was cancelled.
    #[error("Update dispatch aborted: {0}")]
    Dispatch(String),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Messaging channel errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send message on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Channel {name} API call {method} failed: {reason}")]
    ApiFailed {
        name: String,
        method: String,
        reason: String,
    },

    #[error("Channel {name} call timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },
}

/// Record sink errors.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Invalid service account credentials: {0}")]
    Credentials(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Spreadsheet API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Sheet header row {found:?} does not match the expected columns")]
    HeaderMismatch { found: Vec<String> },

    #[error("Record sink call timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Record sink unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for SinkError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}
