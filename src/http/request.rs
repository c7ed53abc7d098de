//! The request descriptor a network-mode dispatch is built from.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::{Headers, Method};

/// Optional request parameters passed through to the transport unmodified.
///
/// An absent `method` means `GET`, both for the wire request and for the
/// default cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchOptions {
    pub method: Option<Method>,
    pub headers: Headers,
    #[serde(skip)]
    pub body: Option<Bytes>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn method(mut self, method: impl Into<Method>) -> Self {
        self.method = Some(method.into());
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A target (URL-like string) plus its [`FetchOptions`].
///
/// # Examples
///
/// ```
/// use fetchcache::http::{FetchOptions, FetchRequest, Method};
///
/// let req = FetchRequest::new("http://localhost/projects/1");
/// assert_eq!(req.method(), &Method::Get);
///
/// let req = FetchRequest::with_options("/items", FetchOptions::new().method("POST"));
/// assert_eq!(req.method().as_str(), "POST");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub target: String,
    #[serde(default)]
    pub options: FetchOptions,
}

static DEFAULT_METHOD: Method = Method::Get;

impl FetchRequest {
    /// Creates a request for `target` with no options.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            options: FetchOptions::default(),
        }
    }

    pub fn with_options(target: impl Into<String>, options: FetchOptions) -> Self {
        Self {
            target: target.into(),
            options,
        }
    }

    /// Returns the effective method, `GET` when none was given.
    pub fn method(&self) -> &Method {
        self.options.method.as_ref().unwrap_or(&DEFAULT_METHOD)
    }
}

impl From<&str> for FetchRequest {
    fn from(target: &str) -> Self {
        Self::new(target)
    }
}

impl From<String> for FetchRequest {
    fn from(target: String) -> Self {
        Self::new(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_defaults_to_get() {
        let req = FetchRequest::new("/a");
        assert!(req.options.method.is_none());
        assert_eq!(req.method(), &Method::Get);
    }

    #[test]
    fn builder_collects_headers_in_order() {
        let opts = FetchOptions::new()
            .header("Accept", "application/json")
            .header("X-Trace", "1");
        let names: Vec<_> = opts.headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Accept", "X-Trace"]);
    }

    #[test]
    fn deserializes_without_options() {
        let req: FetchRequest = serde_json::from_str(r#"{"target":"/p/1"}"#).unwrap();
        assert_eq!(req, FetchRequest::new("/p/1"));
    }
}
