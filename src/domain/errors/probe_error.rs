//! Image probe error types.

use thiserror::Error;

/// Reasons an image probe can fail.
///
/// Probe errors never reach callers of the managers: they are logged and
/// folded into a terminal `error` registry entry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ProbeError {
    #[error("relative image path {path} cannot be probed without a base URL")]
    MissingBaseUrl { path: String },

    #[error("invalid image URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported URL scheme: {scheme}")]
    UnsupportedScheme { scheme: String },

    #[error("network error while probing image: {message}")]
    Network { message: String },

    #[error("image request failed with HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("response is not an image (content type {content_type})")]
    NotAnImage { content_type: String },

    #[error("failed to decode image: {message}")]
    Decode { message: String },

    #[error("image probe timed out after {secs}s")]
    Timeout { secs: u64 },
}

impl ProbeError {
    /// Creates invalid URL error.
    #[must_use]
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Returns whether a later retry could plausibly succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => true,
            Self::HttpStatus { status } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns whether error is network related.
    #[must_use]
    pub const fn is_network_error(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout { .. } | Self::HttpStatus { .. }
        )
    }
}
