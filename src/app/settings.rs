//! Runtime settings for a mirror run.

use std::path::PathBuf;

use thiserror::Error;

use crate::download::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use crate::marketplace::Endpoints;
use crate::scheduler::{DEFAULT_CONCURRENCY, MAX_CONCURRENCY, MIN_CONCURRENCY};

/// Settings rejected before any task runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    /// Concurrency outside the supported range.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The rejected value.
        value: usize,
    },

    /// A zero timeout.
    #[error("{name} timeout must be at least 1 second")]
    InvalidTimeout {
        /// Which timeout.
        name: &'static str,
    },

    /// An endpoint that is not an absolute http(s) URL.
    #[error("invalid {name} URL {value:?}: expected an absolute http(s) URL")]
    InvalidEndpoint {
        /// Which endpoint.
        name: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Everything a run needs besides the task list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Root of the mirrored tree.
    pub output_dir: PathBuf,
    /// Maximum tasks in flight.
    pub concurrency: usize,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Longest idle gap between body reads, in seconds.
    pub read_timeout_secs: u64,
    /// Upstream base URLs.
    pub endpoints: Endpoints,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            concurrency: DEFAULT_CONCURRENCY,
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
            endpoints: Endpoints::default(),
        }
    }
}

impl Settings {
    /// Checks ranges and URL shapes.
    ///
    /// # Errors
    ///
    /// Returns the first [`SettingsError`] found.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(SettingsError::InvalidConcurrency {
                value: self.concurrency,
            });
        }
        if self.connect_timeout_secs == 0 {
            return Err(SettingsError::InvalidTimeout { name: "connect" });
        }
        if self.read_timeout_secs == 0 {
            return Err(SettingsError::InvalidTimeout { name: "read" });
        }
        validate_endpoint("marketplace", &self.endpoints.marketplace)?;
        validate_endpoint("update", &self.endpoints.update)
    }
}

fn validate_endpoint(name: &'static str, value: &str) -> Result<(), SettingsError> {
    match url::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(()),
        _ => Err(SettingsError::InvalidEndpoint {
            name,
            value: value.to_string(),
        }),
    }
}
