//! The seam between the store and whatever performs network requests.

use std::future::Future;

use bytes::Bytes;

use super::{BoxFuture, FetchRequest, Headers};
use crate::error::FetchError;

/// A completed exchange as the transport delivered it, before normalization
/// into a [`Response`](crate::Response).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// Performs a [`FetchRequest`] and resolves to its [`RawResponse`].
///
/// Any `Fn(FetchRequest) -> impl Future<Output = Result<RawResponse, FetchError>>`
/// that is `Send + Sync + 'static` implements this trait through the blanket
/// impl below, which is how tests substitute a canned transport.
pub trait Transport: Send + Sync + 'static {
    fn fetch(&self, request: FetchRequest) -> BoxFuture<Result<RawResponse, FetchError>>;
}

impl<T, F> Transport for T
where
    T: Fn(FetchRequest) -> F + Send + Sync + 'static,
    F: Future<Output = Result<RawResponse, FetchError>> + Send + 'static,
{
    fn fetch(&self, request: FetchRequest) -> BoxFuture<Result<RawResponse, FetchError>> {
        Box::pin((self)(request))
    }
}
