//! vscod Core Library
//!
//! Mirrors VS Code editor builds and marketplace extensions into a directory
//! tree shaped like a declarative JSON configuration, for machines without
//! internet access.
//!
//! # Architecture
//!
//! Control flow, leaf-first:
//! - [`walker`] - Turns the nested config into flat [`DownloadTask`]s
//! - [`resolver`] - Settles "latest" vs pinned versions into [`ResolvedArtifact`]s
//! - [`scheduler`] - Runs resolve, fetch and write per task with bounded concurrency
//! - [`writer`] - Atomic, skip-if-present writes below the output root
//!
//! Supporting modules:
//! - [`artifact`] - Platform/build/version and task types
//! - [`config`] - Configuration document parsing and validation
//! - [`marketplace`] - Marketplace and update-service metadata collaborator
//! - [`download`] - Shared HTTP session and filename helpers
//! - [`app`] - Settings, orchestration and run reporting for the binary

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod artifact;
pub mod config;
pub mod download;
pub mod marketplace;
pub mod resolver;
pub mod scheduler;
#[cfg(test)]
pub mod test_support;
pub(crate) mod user_agent;
pub mod walker;
pub mod writer;

// Re-export commonly used types
pub use app::{Orchestrator, ProcessExit, RunReport, Settings, SettingsError};
pub use artifact::{
    ArtifactDescriptor, BinaryRef, Build, DownloadTask, ExtensionId, ExtensionRef, Platform,
    ResolvedArtifact, Version,
};
pub use config::{BinarySpec, ConfigDocument, ConfigError, ConfigNode};
pub use download::{DownloadError, HttpClient};
pub use marketplace::{BinaryLocation, Endpoints, MarketplaceApi, MarketplaceClient, MarketplaceError};
pub use resolver::{ResolveError, VersionResolver};
pub use scheduler::{
    DEFAULT_CONCURRENCY, DownloadScheduler, RunStats, SchedulerError, TaskError, TaskOutcome,
    TaskResult,
};
pub use walker::{walk_binaries, walk_document, walk_extensions};
pub use writer::{ArtifactWriter, WriteOutcome};
