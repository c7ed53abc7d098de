//! What a dispatch runs.

use std::fmt;
use std::future::Future;

use crate::error::OperationError;
use crate::http::{BoxFuture, FetchRequest, RawResponse};
use crate::response::Response;

/// A zero-argument asynchronous producer whose result is used verbatim as the response.
pub type Producer = Box<dyn FnOnce() -> BoxFuture<Result<Response, OperationError>> + Send>;

/// The asynchronous work behind one dispatch.
pub enum Operation {
    /// Resolved through the store's [`Transport`](crate::http::Transport).
    Fetch(FetchRequest),
    /// An arbitrary producer, e.g. a non-network resolver keyed on an explicit id.
    Produce(Producer),
}

impl Operation {
    pub fn fetch(request: impl Into<FetchRequest>) -> Self {
        Self::Fetch(request.into())
    }

    /// Wraps an async closure as a producer.
    ///
    /// ```
    /// use fetchcache::{Operation, Response};
    ///
    /// let op = Operation::produce(|| async { Ok(Response::ok("42")) });
    /// assert_eq!(op.kind(), "produce");
    /// ```
    pub fn produce<F, Fut>(producer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Response, OperationError>> + Send + 'static,
    {
        Self::Produce(Box::new(
            move || -> BoxFuture<Result<Response, OperationError>> { Box::pin(producer()) },
        ))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::Produce(_) => "produce",
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(request) => f.debug_tuple("Fetch").field(request).finish(),
            Self::Produce(_) => f.write_str("Produce(..)"),
        }
    }
}

impl From<FetchRequest> for Operation {
    fn from(request: FetchRequest) -> Self {
        Self::Fetch(request)
    }
}

/// The successful result of an [`Operation`], before normalization.
#[derive(Debug)]
pub enum Outcome {
    Network(RawResponse),
    Produced(Response),
}

impl Outcome {
    /// Normalizes either shape into the common [`Response`].
    pub fn into_response(self) -> Response {
        match self {
            Self::Network(raw) => Response::from_raw(raw),
            Self::Produced(response) => response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_outcome_is_normalized() {
        let raw = RawResponse::new(200).header("X-A", "1").body("Test");
        let resp = Outcome::Network(raw).into_response();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.data(), "Test");
        assert_eq!(resp.headers().len(), 1);
    }

    #[test]
    fn produced_outcome_is_verbatim() {
        let resp = Response::new(201, "x", Default::default());
        assert_eq!(Outcome::Produced(resp.clone()).into_response(), resp);
    }
}
