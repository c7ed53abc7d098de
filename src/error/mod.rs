//! Error types shared across the crate.
//!
//! Transport failures ([`FetchError`]) and producer failures are both folded
//! into [`OperationError`], which is what a failed [`Entry`](crate::Entry) carries.

use thiserror::Error;

/// Errors produced by a [`Transport`](crate::http::Transport) while performing a request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid target `{target}`: {reason}")]
    InvalidTarget { target: String, reason: &'static str },

    #[error("unsupported scheme `{scheme}` — only plain http:// is supported")]
    UnsupportedScheme { scheme: String },

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("connection closed before the response head was complete")]
    Incomplete,

    #[error("malformed chunked body")]
    InvalidChunk,

    #[error("response body exceeds maximum allowed size of {max_bytes} bytes")]
    BodyTooLarge { max_bytes: usize },
}

/// The failure of a dispatched operation.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("producer failed: {0}")]
    Producer(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl OperationError {
    /// Wraps an arbitrary producer error.
    pub fn producer(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Producer(err.into())
    }
}

/// Errors raised while loading a [`CacheConfig`](crate::config::CacheConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_converts_into_operation_error() {
        let err: OperationError = FetchError::Incomplete.into();
        assert!(matches!(err, OperationError::Fetch(FetchError::Incomplete)));
        assert_eq!(
            err.to_string(),
            "fetch failed: connection closed before the response head was complete"
        );
    }

    #[test]
    fn producer_error_from_str() {
        let err = OperationError::producer("resolver unavailable");
        assert_eq!(err.to_string(), "producer failed: resolver unavailable");
    }
}
