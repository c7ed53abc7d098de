//! Network-side primitives: the request descriptor a dispatch starts from,
//! the header list a response carries, and the [`Transport`] seam that
//! actually performs a request.
//!
//! [`HttpTransport`] is the built-in transport, a minimal HTTP/1.1 client on
//! top of Tokio TCP streams.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub mod client;
pub mod headers;
pub mod request;
pub mod transport;

pub use client::HttpTransport;
pub use headers::Headers;
pub use request::{FetchOptions, FetchRequest};
pub use transport::{RawResponse, Transport};

/// Heap-allocated, type-erased future returned by transports and producers.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// An HTTP request method.
///
/// Standard methods are represented as unit variants; anything else is kept
/// verbatim in `Custom` so that it round-trips into the derived cache key.
///
/// # Examples
///
/// ```
/// use fetchcache::http::Method;
///
/// let method: Method = "POST".parse().unwrap();
/// assert_eq!(method, Method::Post);
/// assert_eq!(method.as_str(), "POST");
/// assert_eq!(Method::default(), Method::Get);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    Connect,
    Trace,
    /// A non-standard extension method.
    Custom(String),
}

impl Method {
    /// Returns the method as a string slice.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch => "PATCH",
            Self::Connect => "CONNECT",
            Self::Trace => "TRACE",
            Self::Custom(s) => s.as_str(),
        }
    }

    /// Returns `true` if a response to this method carries no body (RFC 9110 §9.3.2).
    pub fn is_bodiless(&self) -> bool {
        matches!(self, Self::Head)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            "PATCH" => Self::Patch,
            "CONNECT" => Self::Connect,
            "TRACE" => Self::Trace,
            other => Self::Custom(other.to_owned()),
        })
    }
}

impl From<&str> for Method {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(method) => method,
            Err(never) => match never {},
        }
    }
}

impl AsRef<str> for Method {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Serialize for Method {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Method {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Method::from(raw.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_method_is_kept_verbatim() {
        let m = Method::from("PURGE");
        assert_eq!(m, Method::Custom("PURGE".into()));
        assert_eq!(m.to_string(), "PURGE");
    }

    #[test]
    fn method_names_are_case_sensitive() {
        // RFC 9110 §9.1: method tokens are case-sensitive.
        assert_eq!(Method::from("get"), Method::Custom("get".into()));
    }

    #[test]
    fn serde_uses_the_wire_name() {
        let json = serde_json::to_string(&Method::Delete).unwrap();
        assert_eq!(json, r#""DELETE""#);
        let back: Method = serde_json::from_str(r#""PATCH""#).unwrap();
        assert_eq!(back, Method::Patch);
    }
}
