//! [`MarketplaceApi`] over the public marketplace and editor update service.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{BinaryLocation, Endpoints, MarketplaceApi, MarketplaceError};
use crate::artifact::{Build, ExtensionId, Platform, Version};
use crate::download::{HttpClient, filename_from_url};

/// First `"Version":"…"` value embedded in an extension item page.
#[allow(clippy::expect_used)]
static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""Version":"(.*?)""#).expect("version regex is valid") // Static pattern, safe to panic
});

/// Body of `GET {update}/api/update/{platform}/{build}/latest`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateManifest {
    url: String,
    product_version: String,
}

/// Talks to the marketplace for extensions and the update service for
/// editor binaries, sharing one [`HttpClient`].
#[derive(Debug, Clone)]
pub struct MarketplaceClient {
    http: HttpClient,
    endpoints: Endpoints,
}

impl MarketplaceClient {
    /// Creates a client against the given endpoints.
    #[must_use]
    pub fn new(http: HttpClient, endpoints: Endpoints) -> Self {
        Self { http, endpoints }
    }

    /// Returns the configured endpoints.
    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn item_page_url(&self, extension_id: &ExtensionId) -> String {
        format!(
            "{}/items?itemName={}",
            self.endpoints.marketplace,
            urlencoding::encode(&extension_id.to_string())
        )
    }

    async fn latest_binary(
        &self,
        platform: Platform,
        build: Build,
    ) -> Result<BinaryLocation, MarketplaceError> {
        let identifier = format!("{platform}/{build}");
        let manifest_url = format!(
            "{}/api/update/{platform}/{build}/latest",
            self.endpoints.update
        );
        let manifest: UpdateManifest = self
            .http
            .fetch_json(&manifest_url)
            .await
            .map_err(|e| MarketplaceError::from_transport(&identifier, e))?;

        let parsed = Url::parse(&manifest.url).map_err(|_| {
            MarketplaceError::invalid_response(&identifier, format!("bad url {}", manifest.url))
        })?;
        let filename = filename_from_url(&parsed).ok_or_else(|| {
            MarketplaceError::invalid_response(&identifier, "download url has no file name")
        })?;
        if manifest.product_version.trim().is_empty() {
            return Err(MarketplaceError::invalid_response(
                &identifier,
                "empty productVersion",
            ));
        }

        Ok(BinaryLocation {
            uri: manifest.url,
            filename,
            version: manifest.product_version,
        })
    }

    async fn pinned_binary(
        &self,
        platform: Platform,
        build: Build,
        version: &str,
    ) -> Result<BinaryLocation, MarketplaceError> {
        let identifier = format!("{platform}/{build}");
        let uri = format!(
            "{}/{}/{platform}/{build}",
            self.endpoints.update,
            urlencoding::encode(version)
        );
        let probed = self
            .http
            .probe(&uri)
            .await
            .map_err(|e| MarketplaceError::from_transport(&identifier, e))?;
        let filename = probed.filename.ok_or_else(|| {
            MarketplaceError::invalid_response(&identifier, "no file name in response")
        })?;

        Ok(BinaryLocation {
            uri,
            filename,
            version: version.to_string(),
        })
    }
}

#[async_trait]
impl MarketplaceApi for MarketplaceClient {
    #[instrument(skip(self), fields(extension_id = %extension_id))]
    async fn get_latest_version(
        &self,
        extension_id: &ExtensionId,
    ) -> Result<String, MarketplaceError> {
        let url = self.item_page_url(extension_id);
        let page = self
            .http
            .fetch_text(&url)
            .await
            .map_err(|e| MarketplaceError::from_transport(extension_id.to_string(), e))?;

        // Unknown ids still render a page, just without version metadata.
        let version = VERSION_PATTERN
            .captures(&page)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| MarketplaceError::not_found(extension_id.to_string()))?;

        debug!(version = %version, "found latest extension version");
        Ok(version)
    }

    fn get_download_uri(&self, extension_id: &ExtensionId, version: &str) -> String {
        format!(
            "{}/_apis/public/gallery/publishers/{}/vsextensions/{}/{}/vspackage",
            self.endpoints.marketplace,
            extension_id.publisher(),
            extension_id.name(),
            urlencoding::encode(version)
        )
    }

    #[instrument(skip(self), fields(platform = %platform, build = %build, version = %version))]
    async fn get_binary_download_uri(
        &self,
        platform: Platform,
        build: Build,
        version: &Version,
    ) -> Result<BinaryLocation, MarketplaceError> {
        match version {
            Version::Latest => self.latest_binary(platform, build).await,
            Version::Pinned(pinned) => self.pinned_binary(platform, build, pinned).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> MarketplaceClient {
        MarketplaceClient::new(
            HttpClient::new(),
            Endpoints::new(server.uri(), server.uri()),
        )
    }

    #[test]
    fn test_download_uri_format() {
        let client = MarketplaceClient::new(HttpClient::new(), Endpoints::default());
        let id = ExtensionId::parse("ms-python.python").unwrap();
        assert_eq!(
            client.get_download_uri(&id, "2024.0.1"),
            "https://marketplace.visualstudio.com/_apis/public/gallery/publishers/ms-python/vsextensions/python/2024.0.1/vspackage"
        );
    }

    #[tokio::test]
    async fn test_latest_version_extracted_from_item_page() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/items"))
            .and(query_param("itemName", "ms-python.python"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<script>{"Versions":[{"Version":"2024.0.1","Flags":""},{"Version":"2023.1.0"}]}</script>"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let id = ExtensionId::parse("ms-python.python").unwrap();
        let version = client_for(&server).get_latest_version(&id).await.unwrap();
        assert_eq!(version, "2024.0.1");
    }

    #[tokio::test]
    async fn test_latest_version_missing_is_not_found() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>no such item</html>"))
            .mount(&server)
            .await;

        let id = ExtensionId::parse("nobody.nothing").unwrap();
        let result = client_for(&server).get_latest_version(&id).await;
        assert!(matches!(result, Err(MarketplaceError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_latest_version_server_error_is_transport() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let id = ExtensionId::parse("ms-python.python").unwrap();
        let result = client_for(&server).get_latest_version(&id).await;
        assert!(matches!(result, Err(MarketplaceError::Transport(_))));
    }

    #[tokio::test]
    async fn test_latest_binary_uses_update_manifest() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let download_url = format!("{}/stable/abc123/code_1.85.1-1702462158_amd64.deb", server.uri());
        Mock::given(method("GET"))
            .and(path("/api/update/linux-deb-x64/stable/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "url": download_url,
                "name": "1.85.1",
                "productVersion": "1.85.1",
                "version": "abc123"
            })))
            .mount(&server)
            .await;

        let location = client_for(&server)
            .get_binary_download_uri(Platform::Linux64Deb, Build::Stable, &Version::Latest)
            .await
            .unwrap();
        assert_eq!(location.uri, download_url);
        assert_eq!(location.filename, "code_1.85.1-1702462158_amd64.deb");
        assert_eq!(location.version, "1.85.1");
    }

    #[tokio::test]
    async fn test_pinned_binary_probes_for_filename() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("HEAD"))
            .and(path("/1.80.0/win32-x64/stable"))
            .respond_with(ResponseTemplate::new(200).insert_header(
                "Content-Disposition",
                r#"attachment; filename="VSCodeSetup-x64-1.80.0.exe""#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let location = client_for(&server)
            .get_binary_download_uri(
                Platform::Win64Admin,
                Build::Stable,
                &Version::Pinned("1.80.0".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(location.uri, format!("{}/1.80.0/win32-x64/stable", server.uri()));
        assert_eq!(location.filename, "VSCodeSetup-x64-1.80.0.exe");
        assert_eq!(location.version, "1.80.0");
    }

    #[tokio::test]
    async fn test_pinned_binary_unpublished_is_not_found() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("HEAD"))
            .and(path("/0.0.1/darwin/insider"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .get_binary_download_uri(
                Platform::Osx,
                Build::Insider,
                &Version::Pinned("0.0.1".to_string()),
            )
            .await;
        assert!(matches!(result, Err(MarketplaceError::NotFound { .. })));
    }
}
