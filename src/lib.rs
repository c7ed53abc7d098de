//! # fetchcache
//!
//! A client-side request-deduplication and response cache.
//!
//! Every request maps to a [`CacheKey`]. The [`Store`] holds one [`Entry`]
//! per key, notifies observers as an entry moves from loading to settled, and
//! lets independent consumers share one fetch per key instead of issuing
//! redundant requests.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fetchcache::http::FetchRequest;
//! use fetchcache::{parse_response, Query, Store};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Store::default();
//!     let mut query = Query::new(store, FetchRequest::new("http://127.0.0.1:8080/projects/1"));
//!
//!     query.start();
//!     let entry = query.settled().await.unwrap();
//!     if let Some(parsed) = parse_response(entry.response()) {
//!         println!("{} {:?}", parsed.status, parsed.data);
//!     }
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod inspect;
pub mod key;
pub mod query;
pub mod response;
pub mod store;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use config::CacheConfig;
pub use error::{FetchError, OperationError};
pub use key::{CacheKey, DefaultKeyDeriver, KeyDeriver};
pub use query::Query;
pub use response::{ParsedResponse, Response, parse_response, parse_response_as};
pub use store::{Entry, ObserverHandle, Operation, Snapshot, Store};
