//! Error taxonomy shared by providers, devices and configuration loading.
//!
//! - `ProviderError`: game data could not be fetched or understood. The
//!   caller skips the tick.
//! - `DeviceError`: the light could not be read or written. The caller skips
//!   the device action and retries on the next tick.
//! - `ConfigError`: startup configuration is missing or invalid. Fatal.

use std::time::Duration;

/// Failure fetching or normalizing game data
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Parse(String),

    #[error("circuit open for feed {0}")]
    CircuitOpen(String),
}

/// Failure talking to a light
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("device {host} unreachable: {source}")]
    Unreachable {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("device {host} timed out after {timeout:?}")]
    Timeout { host: String, timeout: Duration },

    #[error("device {0} is not a light")]
    NotALight(String),

    #[error("device {host} rejected command (err_code {code}): {message}")]
    Rejected {
        host: String,
        code: i64,
        message: String,
    },

    #[error("device {host} sent an invalid response: {reason}")]
    Protocol { host: String, reason: String },
}

/// Invalid or missing startup configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(String),

    #[error("invalid {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
