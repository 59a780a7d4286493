//! Error types for the realtime link.

use std::io;
use thiserror::Error;

/// Result type for link operations.
pub type Result<T> = std::result::Result<T, LinkError>;

/// Errors raised at the transport and persistence seams.
///
/// None of these escape [`ConnectionManager`](crate::ConnectionManager)'s
/// public operations: they are absorbed into the reconnect and offline paths.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LinkError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Transport closed")]
    Closed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl LinkError {
    /// Check if this error should feed the reconnect path.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LinkError::Transport(_) | LinkError::Closed | LinkError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_is_retryable() {
        assert!(LinkError::Transport("connection refused".into()).is_retryable());
        assert!(LinkError::Closed.is_retryable());
    }

    #[test]
    fn test_config_not_retryable() {
        assert!(!LinkError::Config("bad".into()).is_retryable());
        assert!(!LinkError::Storage("full".into()).is_retryable());
    }

    #[test]
    fn test_invalid_url_from_parse_error() {
        let err: LinkError = url::Url::parse("not a url").unwrap_err().into();
        assert!(err.to_string().starts_with("Invalid server URL"));
    }
}
