//! Store and transport configuration.
//!
//! Every field has a default, so an empty JSON object (or
//! [`CacheConfig::default`]) is a valid configuration.
//!
//! ```
//! use fetchcache::config::CacheConfig;
//!
//! let config = CacheConfig::from_json_str(r#"{
//!     "client": { "user_agent": "my-app/1.0" },
//!     "inspector": { "enabled": true, "name": "projects" }
//! }"#).unwrap();
//!
//! assert_eq!(config.client.user_agent, "my-app/1.0");
//! assert_eq!(config.client.max_body_bytes, 8 * 1024 * 1024);
//! assert!(config.inspector.enabled);
//! ```

use serde::Deserialize;

use crate::error::ConfigError;

/// Default cap on a buffered response body (8 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub client: ClientConfig,
    pub inspector: InspectorConfig,
}

impl CacheConfig {
    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Json`] — the document is malformed.
    /// - [`ConfigError::Invalid`] — a field holds an unusable value.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client.max_body_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "client.max_body_bytes",
                reason: "must be greater than zero",
            });
        }
        if self.client.user_agent.contains(['\r', '\n']) {
            return Err(ConfigError::Invalid {
                field: "client.user_agent",
                reason: "must not contain line breaks",
            });
        }
        Ok(())
    }
}

/// Settings for [`HttpTransport`](crate::http::HttpTransport).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Sent as `User-Agent` unless the request sets its own.
    pub user_agent: String,
    /// Responses with a larger body fail with `FetchError::BodyTooLarge`.
    pub max_body_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("fetchcache/", env!("CARGO_PKG_VERSION")).to_owned(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Whether the store reports transitions to a [`TracingInspector`](crate::inspect::TracingInspector).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    pub enabled: bool,
    /// Label attached to every reported transition.
    pub name: String,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: "Data Cache".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let config = CacheConfig::from_json_str("{}").unwrap();
        assert!(!config.inspector.enabled);
        assert_eq!(config.inspector.name, "Data Cache");
        assert!(config.client.user_agent.starts_with("fetchcache/"));
    }

    #[test]
    fn zero_body_limit_is_rejected() {
        let err = CacheConfig::from_json_str(r#"{"client":{"max_body_bytes":0}}"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "client.max_body_bytes",
                ..
            }
        ));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            CacheConfig::from_json_str("{"),
            Err(ConfigError::Json(_))
        ));
    }
}
