//! Error types for configuration loading and validation.
//!
//! Every variant here is fatal: the run aborts before any download starts.

use std::path::PathBuf;

use thiserror::Error;

use crate::artifact::{Build, Platform};

/// Structural or semantic problem in a configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Read {
        /// The config file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Document is not valid JSON or has the wrong shape.
    #[error("invalid config document: {source}")]
    Parse {
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A binary specification has no `platform` field.
    #[error(
        "binary specification #{index} is missing the required `platform` field\n  Suggestion: Run `vscod list-opts --platforms` for valid values"
    )]
    MissingPlatform {
        /// Zero-based position in the `vscode` sequence.
        index: usize,
    },

    /// Platform string outside the supported set.
    #[error("unknown platform '{value}' (expected one of: {expected})")]
    UnknownPlatform {
        /// The rejected value.
        value: String,
        /// Comma-separated list of accepted values.
        expected: String,
    },

    /// Build string outside the supported set.
    #[error("unknown build '{value}' (expected one of: {expected})")]
    UnknownBuild {
        /// The rejected value.
        value: String,
        /// Comma-separated list of accepted values.
        expected: String,
    },

    /// A version field was present but blank.
    #[error("empty version for {context}")]
    EmptyVersion {
        /// Which entry carried the blank version.
        context: String,
    },

    /// An extension leaf holds an empty string.
    #[error("value for key '{path}' was empty")]
    EmptyLeaf {
        /// Key path of the leaf.
        path: String,
    },

    /// A node is neither a string nor a mapping.
    #[error("value for key '{path}' must be a string or a mapping, found {found}")]
    InvalidNodeType {
        /// Key path of the node.
        path: String,
        /// JSON type that was found.
        found: &'static str,
    },

    /// A mapping key cannot be used as a directory name.
    #[error("key '{segment}' under '{path}' is not a usable directory name")]
    InvalidSegment {
        /// Key path of the parent branch.
        path: String,
        /// The rejected key.
        segment: String,
    },

    /// Extension identifier is not `publisher.name`.
    #[error("invalid extension id '{value}': {reason}")]
    InvalidExtensionId {
        /// The rejected identifier.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

impl ConfigError {
    /// Creates a read error.
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Creates an unknown-platform error listing the supported set.
    #[must_use]
    pub fn unknown_platform(value: &str) -> Self {
        Self::UnknownPlatform {
            value: value.to_string(),
            expected: Platform::ALL
                .iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Creates an unknown-build error listing the supported set.
    #[must_use]
    pub fn unknown_build(value: &str) -> Self {
        Self::UnknownBuild {
            value: value.to_string(),
            expected: Build::ALL
                .iter()
                .map(|b| b.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Creates an empty-version error.
    #[must_use]
    pub fn empty_version(context: &str) -> Self {
        Self::EmptyVersion {
            context: context.to_string(),
        }
    }

    /// Creates an invalid-extension-id error.
    #[must_use]
    pub fn invalid_extension_id(value: &str, reason: &'static str) -> Self {
        Self::InvalidExtensionId {
            value: value.to_string(),
            reason,
        }
    }
}
