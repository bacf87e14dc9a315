//! Transport collaborator: the shared HTTP session.
//!
//! This module owns everything that touches the network directly:
//!
//! - one pooled reqwest client with connect/read timeouts and a tool User-Agent
//! - text/JSON metadata fetches and HEAD probes
//! - streaming artifact bodies as [`ByteStream`]
//! - filename extraction from Content-Disposition headers and URLs
//!
//! Requests are attempted once; there is no retry at this layer.

mod client;
mod constants;
mod error;
mod filename;

pub use client::{ByteStream, HttpClient, ProbedFile};
pub use constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
pub use error::DownloadError;
pub use filename::{is_safe_path_segment, sanitize_filename};
pub(crate) use filename::filename_from_url;

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
