//! Failure modes reported by the marketplace collaborator.

use thiserror::Error;

use crate::download::DownloadError;

/// Errors surfaced by [`MarketplaceApi`](super::MarketplaceApi) implementations.
#[derive(Debug, Error)]
pub enum MarketplaceError {
    /// The identifier (or identifier + version) is not published upstream.
    #[error("{identifier} was not found upstream")]
    NotFound {
        /// Extension id or `platform/build` pair.
        identifier: String,
    },

    /// The request itself failed.
    #[error(transparent)]
    Transport(#[from] DownloadError),

    /// The service answered, but not with anything usable.
    #[error("unusable metadata for {identifier}: {reason}")]
    InvalidResponse {
        /// Extension id or `platform/build` pair.
        identifier: String,
        /// What was missing or malformed.
        reason: String,
    },
}

impl MarketplaceError {
    /// Creates a not-found error.
    pub fn not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            identifier: identifier.into(),
        }
    }

    /// Creates an invalid-response error.
    pub fn invalid_response(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// Maps a transport error, turning 404/410 into [`Self::NotFound`].
    pub(crate) fn from_transport(identifier: impl Into<String>, error: DownloadError) -> Self {
        if error.is_not_found() {
            Self::not_found(identifier)
        } else {
            Self::Transport(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_classifies_404_as_not_found() {
        let err = MarketplaceError::from_transport(
            "ms-python.python",
            DownloadError::http_status("https://m/items", 404),
        );
        assert!(matches!(err, MarketplaceError::NotFound { identifier } if identifier == "ms-python.python"));
    }

    #[test]
    fn test_from_transport_keeps_server_errors() {
        let err = MarketplaceError::from_transport("x.y", DownloadError::http_status("u", 503));
        assert!(matches!(err, MarketplaceError::Transport(_)));
        assert!(err.to_string().contains("503"));
    }
}
