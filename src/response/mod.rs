//! The settled payload stored in an [`Entry`](crate::Entry), and helpers to
//! decode it.
//!
//! A [`Response`] is immutable once built. Network dispatches produce one from
//! a [`RawResponse`] via [`Response::from_raw`]; producer dispatches build one
//! directly.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::http::{Headers, RawResponse};

/// Status, text body and ordered headers of one completed operation.
///
/// # Examples
///
/// ```
/// use fetchcache::http::RawResponse;
/// use fetchcache::Response;
///
/// let raw = RawResponse::new(200).header("Content-Type", "text/plain").body("Test");
/// let resp = Response::from_raw(raw);
/// assert_eq!(resp.status(), 200);
/// assert_eq!(resp.data(), "Test");
/// assert_eq!(resp.headers().get("content-type"), Some("text/plain"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    status: u16,
    data: String,
    #[serde(default)]
    headers: Headers,
}

impl Response {
    pub fn new(status: u16, data: impl Into<String>, headers: Headers) -> Self {
        Self {
            status,
            data: data.into(),
            headers,
        }
    }

    /// A `200` response with no headers, the usual shape for a producer result.
    pub fn ok(data: impl Into<String>) -> Self {
        Self::new(200, data, Headers::new())
    }

    /// Serializes `value` as JSON into a `200` response.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        let data = serde_json::to_string(value)?;
        Ok(Self::new(
            200,
            data,
            [("Content-Type", "application/json")].into_iter().collect(),
        ))
    }

    /// Normalizes a transport response: the full body read as text (invalid
    /// UTF-8 replaced), the numeric status, and the headers in source order.
    pub fn from_raw(raw: RawResponse) -> Self {
        let data = match String::from_utf8(raw.body.to_vec()) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };
        Self {
            status: raw.status,
            data,
            headers: raw.headers,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A [`Response`] whose body has been decoded as structured content.
///
/// `data` is `None` when the body was empty or failed to decode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedResponse<T = Value> {
    pub status: u16,
    #[serde(skip_serializing_if = "Headers::is_empty")]
    pub headers: Headers,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// Decodes the body of `response` as JSON.
///
/// Returns `None` for an absent response. A decode failure never propagates:
/// the result then carries only `status` and `headers`.
///
/// # Examples
///
/// ```
/// use fetchcache::{parse_response, Response};
///
/// let parsed = parse_response(Some(&Response::ok(r#"{"id":"1"}"#))).unwrap();
/// assert_eq!(parsed.data.unwrap()["id"], "1");
///
/// let parsed = parse_response(Some(&Response::ok("not-json"))).unwrap();
/// assert_eq!(parsed.status, 200);
/// assert!(parsed.data.is_none());
///
/// assert!(parse_response(None).is_none());
/// ```
pub fn parse_response(response: Option<&Response>) -> Option<ParsedResponse> {
    parse_response_as::<Value>(response)
}

/// Typed variant of [`parse_response`].
pub fn parse_response_as<T: DeserializeOwned>(
    response: Option<&Response>,
) -> Option<ParsedResponse<T>> {
    let response = response?;

    let data = if response.data.is_empty() {
        None
    } else {
        match serde_json::from_str(&response.data) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(status = response.status, error = %e, "response body is not valid JSON");
                None
            }
        }
    };

    Some(ParsedResponse {
        status: response.status,
        headers: response.headers.clone(),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_json_yields_status_only() {
        let parsed = parse_response(Some(&Response::ok("not-json"))).unwrap();
        assert_eq!(parsed.status, 200);
        assert!(parsed.data.is_none());
        assert_eq!(serde_json::to_value(&parsed).unwrap(), serde_json::json!({"status": 200}));
    }

    #[test]
    fn success_means_2xx() {
        assert!(Response::ok("").is_success());
        assert!(Response::new(204, "", Headers::new()).is_success());
        assert!(!Response::new(304, "", Headers::new()).is_success());
        assert!(!Response::new(500, "", Headers::new()).is_success());
    }

    #[test]
    fn empty_body_yields_status_only() {
        let parsed = parse_response(Some(&Response::new(204, "", Headers::new()))).unwrap();
        assert_eq!(parsed.status, 204);
        assert!(parsed.data.is_none());
    }

    #[test]
    fn headers_survive_decode_failure() {
        let headers: Headers = [("Content-Type", "application/json")].into_iter().collect();
        let parsed = parse_response(Some(&Response::new(500, "<html>", headers))).unwrap();
        assert_eq!(parsed.headers.get("content-type"), Some("application/json"));
        assert!(parsed.data.is_none());
    }

    #[test]
    fn typed_decode() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Project {
            id: String,
        }

        let parsed = parse_response_as::<Project>(Some(&Response::ok(r#"{"id":"2"}"#))).unwrap();
        assert_eq!(parsed.data, Some(Project { id: "2".into() }));

        // Valid JSON of the wrong shape is a decode failure too.
        let parsed = parse_response_as::<Project>(Some(&Response::ok("[1,2]"))).unwrap();
        assert!(parsed.data.is_none());
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let raw = RawResponse::new(200).body(&b"ok\xff"[..]);
        assert_eq!(Response::from_raw(raw).data(), "ok\u{fffd}");
    }

    #[test]
    fn json_constructor_sets_content_type() {
        let resp = Response::json(&serde_json::json!({"id": "1"})).unwrap();
        assert_eq!(resp.data(), r#"{"id":"1"}"#);
        assert_eq!(resp.headers().get("Content-Type"), Some("application/json"));
    }
}
