//! Shared HTTP session for metadata lookups and artifact fetches.
//!
//! One [`HttpClient`] is built per run and cloned into every task; clones
//! share reqwest's connection pool.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::{Client, ClientBuilder, Proxy, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use super::filename::filename_from_response;
use crate::user_agent;

/// Body of a fetched artifact, yielded chunk by chunk.
pub type ByteStream = BoxStream<'static, Result<Bytes, DownloadError>>;

/// What a HEAD request revealed about a download location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbedFile {
    /// URL after following redirects.
    pub final_url: String,
    /// Filename from Content-Disposition or the final URL path.
    pub filename: Option<String>,
}

/// HTTP client with streaming support.
///
/// This client is designed to be created once and reused for every task,
/// taking advantage of connection pooling.
///
/// # Example
///
/// ```no_run
/// use vscod_core::download::HttpClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
/// let page = client.fetch_text("https://marketplace.visualstudio.com/").await?;
/// println!("{} bytes", page.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout: 5 minutes idle between reads (no overall deadline)
    /// - Gzip decompression: enabled
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
            .expect("failed to build HTTP client with static configuration")
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error when the TLS backend or proxy
    /// configuration cannot be initialized.
    pub fn with_timeouts(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let client = build_client(connect_timeout_secs, read_timeout_secs)?;
        Ok(Self { client })
    }

    /// Returns the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Sends a GET request and fails on non-success status.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if the URL is invalid, the request fails, or
    /// the server answers with a 4xx/5xx status.
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    pub async fn get(&self, url: &str) -> Result<Response, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;
        check_status(url, response)
    }

    /// Fetches a URL and returns its body as text.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`get`](Self::get), plus network errors while
    /// reading the body.
    pub async fn fetch_text(&self, url: &str) -> Result<String, DownloadError> {
        let response = self.get(url).await?;
        let text = response
            .text()
            .await
            .map_err(|e| DownloadError::network(url, e))?;
        debug!(url = %url, bytes = text.len(), "fetched text");
        Ok(text)
    }

    /// Fetches a URL and decodes its body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`get`](Self::get), plus
    /// [`DownloadError::InvalidResponse`] when the body does not decode.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, DownloadError> {
        let response = self.get(url).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| DownloadError::network(url, e))?;
        serde_json::from_slice(&body)
            .map_err(|e| DownloadError::invalid_response(url, format!("invalid JSON: {e}")))
    }

    /// Issues a HEAD request, following redirects, to learn the final
    /// location and filename of a download.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if the URL is invalid, the request fails, or
    /// the server answers with a 4xx/5xx status.
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    pub async fn probe(&self, url: &str) -> Result<ProbedFile, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        let response = self
            .client
            .head(parsed)
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;
        let response = check_status(url, response)?;

        let final_url = response.url().clone();
        let filename = filename_from_response(response.headers(), &final_url);
        debug!(final_url = %final_url, filename = ?filename, "probed download location");
        Ok(ProbedFile {
            final_url: final_url.to_string(),
            filename,
        })
    }

    /// Starts a GET and returns the body as a chunk stream.
    ///
    /// The status is checked before the stream is returned, so a 404 never
    /// reaches the writer.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`get`](Self::get). Errors while reading the
    /// body surface as stream items.
    pub async fn fetch_stream(&self, url: &str) -> Result<ByteStream, DownloadError> {
        let response = self.get(url).await?;
        let url = url.to_string();
        Ok(response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| DownloadError::network(url.clone(), e)))
            .boxed())
    }
}

fn check_status(url: &str, response: Response) -> Result<Response, DownloadError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(DownloadError::http_status(url, status.as_u16()))
    }
}

fn build_client(connect_timeout_secs: u64, read_timeout_secs: u64) -> Result<Client, reqwest::Error> {
    match try_build_client(connect_timeout_secs, read_timeout_secs, false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Some sandboxed environments panic when querying system proxy
            // settings; env proxies still apply on the fallback path.
            warn!(
                "HTTP client builder panicked while loading system proxy settings; retrying with env-proxy fallback"
            );
            match try_build_client(connect_timeout_secs, read_timeout_secs, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Build(error)) => Err(error),
                Err(BuildClientFailure::Panic) => {
                    // The fallback skips system proxy lookup entirely.
                    Client::builder().no_proxy().build()
                }
            }
        }
        Err(BuildClientFailure::Build(error)) => Err(error),
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build_client(
    connect_timeout_secs: u64,
    read_timeout_secs: u64,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_client_builder(connect_timeout_secs, read_timeout_secs);
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_client_builder(connect_timeout_secs: u64, read_timeout_secs: u64) -> ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        // Idle limit between reads; large archives may take far longer overall.
        .read_timeout(Duration::from_secs(read_timeout_secs))
        .gzip(true)
        .user_agent(user_agent::default_user_agent())
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_proxy_for_scheme("https")
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = env_proxy_for_scheme("http")
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    match scheme {
        "https" => find_first_proxy_var(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"]),
        "http" => find_first_proxy_var(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"]),
        _ => None,
    }
}

fn find_first_proxy_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
