//! Marketplace and update-service metadata collaborator.
//!
//! - [`MarketplaceApi`] - Async trait the version resolver talks to
//! - [`MarketplaceClient`] - Implementation over the public marketplace and
//!   editor update service
//! - [`Endpoints`] - Base URLs, overridable for mirrors and tests
//!
//! # Example
//!
//! ```no_run
//! use vscod_core::artifact::ExtensionId;
//! use vscod_core::download::HttpClient;
//! use vscod_core::marketplace::{Endpoints, MarketplaceApi, MarketplaceClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = MarketplaceClient::new(HttpClient::new(), Endpoints::default());
//! let id = ExtensionId::parse("ms-python.python")?;
//! let version = client.get_latest_version(&id).await?;
//! println!("{}", client.get_download_uri(&id, &version));
//! # Ok(())
//! # }
//! ```

mod client;
mod error;

pub use client::MarketplaceClient;
pub use error::MarketplaceError;

use async_trait::async_trait;

use crate::artifact::{Build, ExtensionId, Platform, Version};

/// Default marketplace base URL.
pub const DEFAULT_MARKETPLACE_URL: &str = "https://marketplace.visualstudio.com";

/// Default editor update-service base URL.
pub const DEFAULT_UPDATE_URL: &str = "https://update.code.visualstudio.com";

/// Base URLs of the two upstream services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Extension marketplace (item pages and package downloads).
    pub marketplace: String,
    /// Editor update service (installers and archives).
    pub update: String,
}

impl Endpoints {
    /// Creates endpoints, dropping trailing slashes so paths join cleanly.
    #[must_use]
    pub fn new(marketplace: impl Into<String>, update: impl Into<String>) -> Self {
        Self {
            marketplace: marketplace.into().trim_end_matches('/').to_string(),
            update: update.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_MARKETPLACE_URL, DEFAULT_UPDATE_URL)
    }
}

/// Where an editor binary lives and what it is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryLocation {
    /// Download URI.
    pub uri: String,
    /// Service-provided file name.
    pub filename: String,
    /// Concrete product version, when the service reports one.
    pub version: String,
}

/// Metadata lookups the version resolver depends on.
///
/// # Object Safety
///
/// Uses `async_trait` so the resolver can hold an `Arc<dyn MarketplaceApi>`;
/// native async trait methods are not object-safe.
#[async_trait]
pub trait MarketplaceApi: Send + Sync {
    /// Returns the current published version of an extension.
    async fn get_latest_version(&self, extension_id: &ExtensionId)
    -> Result<String, MarketplaceError>;

    /// Builds the package URI for an extension at a concrete version.
    fn get_download_uri(&self, extension_id: &ExtensionId, version: &str) -> String;

    /// Locates an editor binary.
    async fn get_binary_download_uri(
        &self,
        platform: Platform,
        build: Build,
        version: &Version,
    ) -> Result<BinaryLocation, MarketplaceError>;
}
