//! Version resolution: turns a [`DownloadTask`] into a [`ResolvedArtifact`].
//!
//! Pinned extension versions are resolved locally with no network traffic;
//! `latest` costs exactly one metadata lookup. Editor binaries always ask the
//! update service, because the file name is only known upstream.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::artifact::{
    ArtifactDescriptor, BinaryRef, DownloadTask, ExtensionRef, ResolvedArtifact, Version,
    extension_filename,
};
use crate::download::DownloadError;
use crate::marketplace::{MarketplaceApi, MarketplaceError};

/// Errors that can occur while resolving a task.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The identifier does not exist upstream.
    #[error("artifact not found: {identifier}")]
    ArtifactNotFound {
        /// Extension id or `platform/build` pair.
        identifier: String,
    },

    /// An explicit version was requested but is not published.
    #[error("version {version} of {identifier} is not published")]
    VersionNotFound {
        /// Extension id or `platform/build` pair.
        identifier: String,
        /// The requested version.
        version: String,
    },

    /// The metadata request failed in transit.
    #[error("metadata lookup for {identifier} failed: {source}")]
    Network {
        /// Extension id or `platform/build` pair.
        identifier: String,
        /// Transport failure.
        #[source]
        source: DownloadError,
    },

    /// The service answered with metadata that could not be used.
    #[error("unusable metadata for {identifier}: {reason}")]
    InvalidMetadata {
        /// Extension id or `platform/build` pair.
        identifier: String,
        /// What was wrong.
        reason: String,
    },
}

impl ResolveError {
    /// Maps a collaborator failure for `descriptor`.
    ///
    /// Not-found means the version is missing when one was pinned, and the
    /// artifact itself is missing otherwise.
    fn from_marketplace(descriptor: &ArtifactDescriptor, error: MarketplaceError) -> Self {
        let identifier = descriptor.identifier();
        match error {
            MarketplaceError::NotFound { .. } => match descriptor.version() {
                Version::Pinned(version) => Self::VersionNotFound {
                    identifier,
                    version: version.clone(),
                },
                Version::Latest => Self::ArtifactNotFound { identifier },
            },
            MarketplaceError::Transport(source) => Self::Network { identifier, source },
            MarketplaceError::InvalidResponse { reason, .. } => {
                Self::InvalidMetadata { identifier, reason }
            }
        }
    }
}

/// Settles the concrete version, source URI and file name of each task.
#[derive(Clone)]
pub struct VersionResolver {
    marketplace: Arc<dyn MarketplaceApi>,
}

impl std::fmt::Debug for VersionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionResolver").finish_non_exhaustive()
    }
}

impl VersionResolver {
    /// Creates a resolver backed by `marketplace`.
    #[must_use]
    pub fn new(marketplace: Arc<dyn MarketplaceApi>) -> Self {
        Self { marketplace }
    }

    /// Resolves one task.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::ArtifactNotFound`] when a `latest` lookup finds nothing
    /// - [`ResolveError::VersionNotFound`] when a pinned binary version is not published
    /// - [`ResolveError::Network`] / [`ResolveError::InvalidMetadata`] on lookup failure
    #[instrument(skip(self, task), fields(artifact = %task.descriptor.identifier(), version = %task.descriptor.version()))]
    pub async fn resolve(&self, task: &DownloadTask) -> Result<ResolvedArtifact, ResolveError> {
        let resolved = match &task.descriptor {
            ArtifactDescriptor::Extension(ext) => self.resolve_extension(task, ext).await?,
            ArtifactDescriptor::Binary(bin) => self.resolve_binary(task, bin).await?,
        };
        debug!(
            concrete_version = %resolved.concrete_version,
            filename = %resolved.target_filename,
            "resolved"
        );
        Ok(resolved)
    }

    async fn resolve_extension(
        &self,
        task: &DownloadTask,
        ext: &ExtensionRef,
    ) -> Result<ResolvedArtifact, ResolveError> {
        let concrete_version = match &ext.version {
            Version::Pinned(version) => version.clone(),
            Version::Latest => self
                .marketplace
                .get_latest_version(&ext.extension_id)
                .await
                .map_err(|e| ResolveError::from_marketplace(&task.descriptor, e))?,
        };

        Ok(ResolvedArtifact {
            source_uri: self
                .marketplace
                .get_download_uri(&ext.extension_id, &concrete_version),
            target_filename: extension_filename(&ext.extension_id, &concrete_version),
            concrete_version,
            task: task.clone(),
        })
    }

    async fn resolve_binary(
        &self,
        task: &DownloadTask,
        bin: &BinaryRef,
    ) -> Result<ResolvedArtifact, ResolveError> {
        let location = self
            .marketplace
            .get_binary_download_uri(bin.platform, bin.build, &bin.version)
            .await
            .map_err(|e| ResolveError::from_marketplace(&task.descriptor, e))?;

        Ok(ResolvedArtifact {
            task: task.clone(),
            concrete_version: location.version,
            source_uri: location.uri,
            target_filename: location.filename,
        })
    }
}
