//! A consumer of one cached key.
//!
//! The store never decides when to dispatch; [`Query`] holds that policy:
//!
//! - on [`start`](Query::start) it registers a single observer and dispatches
//!   if the key has no settled entry and nobody else is already loading it;
//! - it dispatches at most once per change of its local entry, and a loading
//!   notification that arrives while the local entry is already loading is
//!   dropped, so it never counts as a change;
//! - in suspend mode nothing is dispatched automatically; [`trigger`](Query::trigger)
//!   dispatches unconditionally and is the only way to refetch a settled key.
//!
//! ```
//! use fetchcache::http::{FetchRequest, RawResponse};
//! use fetchcache::error::FetchError;
//! use fetchcache::{Query, Store};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = Store::new(|_: FetchRequest| async {
//!     Ok::<_, FetchError>(RawResponse::new(200).body(r#"{"id":"1"}"#))
//! });
//!
//! let mut query = Query::new(store.clone(), FetchRequest::new("http://api/projects/1"));
//! assert!(query.state().is_loading);
//!
//! query.start().unwrap().await.unwrap();
//! let entry = query.state();
//! assert_eq!(entry.response().unwrap().status(), 200);
//!
//! // A second consumer of the same key reuses the cached response.
//! let mut other = Query::new(store, FetchRequest::new("http://api/projects/1"));
//! assert!(other.start().is_none());
//! assert_eq!(other.state(), entry);
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::OperationError;
use crate::http::{BoxFuture, FetchRequest};
use crate::key::{CacheKey, DefaultKeyDeriver, KeyDeriver};
use crate::response::Response;
use crate::store::{Entry, ObserverHandle, Operation, Store};

/// Predicate deciding whether a cached entry for a request must be refetched.
pub type Invalidate = Arc<dyn Fn(&FetchRequest) -> bool + Send + Sync + 'static>;

type ProducerFactory =
    Arc<dyn Fn() -> BoxFuture<Result<Response, OperationError>> + Send + Sync + 'static>;

enum Source {
    Request(FetchRequest),
    Producer(ProducerFactory),
}

#[derive(Debug, Clone)]
struct Local {
    entry: Entry,
    // Bumped on every accepted change; the dispatch guard keys on it.
    generation: u64,
}

/// One consumer's view of a cached key.
pub struct Query {
    store: Store,
    source: Source,
    deriver: Arc<dyn KeyDeriver>,
    invalidate: Option<Invalidate>,
    suspend: bool,
    key: CacheKey,
    local: Arc<watch::Sender<Local>>,
    changes: watch::Receiver<Local>,
    subscription: Option<ObserverHandle>,
    dispatched_at: Option<u64>,
}

impl Query {
    /// A query for `request`, keyed with [`DefaultKeyDeriver`].
    pub fn new(store: Store, request: FetchRequest) -> Self {
        let deriver: Arc<dyn KeyDeriver> = Arc::new(DefaultKeyDeriver);
        let key = deriver.derive(&request);
        Self::build(store, Source::Request(request), deriver, key)
    }

    /// A query whose operation is `producer`, cached under an explicit `key`.
    pub fn resolver<F, Fut>(store: Store, key: impl Into<CacheKey>, producer: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, OperationError>> + Send + 'static,
    {
        let factory: ProducerFactory = Arc::new(
            move || -> BoxFuture<Result<Response, OperationError>> { Box::pin(producer()) },
        );
        Self::build(
            store,
            Source::Producer(factory),
            Arc::new(DefaultKeyDeriver),
            key.into(),
        )
    }

    fn build(store: Store, source: Source, deriver: Arc<dyn KeyDeriver>, key: CacheKey) -> Self {
        let initial = Local {
            entry: store.entry(&key).unwrap_or_else(Entry::loading),
            generation: 0,
        };
        let (tx, rx) = watch::channel(initial);
        Self {
            store,
            source,
            deriver,
            invalidate: None,
            suspend: false,
            key,
            local: Arc::new(tx),
            changes: rx,
            subscription: None,
            dispatched_at: None,
        }
    }

    /// Replaces the key deriver. Has no effect on a resolver query.
    #[must_use]
    pub fn key_deriver(mut self, deriver: impl KeyDeriver + 'static) -> Self {
        self.deriver = Arc::new(deriver);
        if let Source::Request(request) = &self.source {
            self.key = self.deriver.derive(request);
            self.reset_local();
        }
        self
    }

    /// Disables automatic dispatch; only [`trigger`](Self::trigger) fetches.
    #[must_use]
    pub fn suspend(mut self, suspend: bool) -> Self {
        self.suspend = suspend;
        self.reset_local();
        self
    }

    /// Refetch on start even if the store already holds a settled entry,
    /// whenever `predicate` returns `true` for the request.
    #[must_use]
    pub fn invalidate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&FetchRequest) -> bool + Send + Sync + 'static,
    {
        self.invalidate = Some(Arc::new(predicate));
        self
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn is_suspended(&self) -> bool {
        self.suspend
    }

    /// The local entry as last accepted from the store.
    pub fn state(&self) -> Entry {
        self.local.borrow().entry.clone()
    }

    /// Subscribes (once) and dispatches if needed.
    pub fn start(&mut self) -> Option<JoinHandle<()>> {
        self.subscribe();
        if !self.suspend && self.invalidated() && self.state().is_settled() {
            debug!(key = %self.key, "cached entry invalidated");
            return Some(self.trigger());
        }
        self.ensure()
    }

    /// Dispatches if the local entry has no result, nobody is loading the key,
    /// and no dispatch was issued since the local entry last changed.
    pub fn ensure(&mut self) -> Option<JoinHandle<()>> {
        self.subscribe();
        if self.suspend {
            return None;
        }
        let (settled, generation) = {
            let local = self.local.borrow();
            (local.entry.is_settled(), local.generation)
        };
        if settled || self.dispatched_at == Some(generation) {
            return None;
        }
        if self.store.entry(&self.key).is_some_and(|e| e.is_loading) {
            // A dispatch is already in flight; its settlement reaches our observer.
            return None;
        }
        Some(self.trigger())
    }

    /// Dispatches unconditionally, regardless of the current entry.
    pub fn trigger(&mut self) -> JoinHandle<()> {
        self.subscribe();
        self.dispatched_at = Some(self.local.borrow().generation);
        let operation = match &self.source {
            Source::Request(request) => Operation::Fetch(request.clone()),
            Source::Producer(factory) => {
                let factory = Arc::clone(factory);
                Operation::Produce(Box::new(move || factory()))
            }
        };
        self.store.dispatch(operation, self.key.clone())
    }

    /// Switches to `request`. If that changes the key, the query follows the
    /// new key and fetches it when it is not already cached.
    pub fn retarget(&mut self, request: FetchRequest) -> Option<JoinHandle<()>> {
        let key = self.deriver.derive(&request);
        self.source = Source::Request(request);
        if key == self.key {
            return None;
        }

        debug!(from = %self.key, to = %key, "query retargeted");
        if let Some(handle) = self.subscription.take() {
            self.store.unsubscribe(&self.key, handle);
        }
        self.key = key;
        self.dispatched_at = None;
        self.reset_local();
        self.start()
    }

    /// Waits for the next accepted change and returns the new local entry.
    ///
    /// Returns `None` only if the query can no longer change.
    pub async fn changed(&mut self) -> Option<Entry> {
        self.changes.changed().await.ok()?;
        Some(self.changes.borrow_and_update().entry.clone())
    }

    /// Waits until the local entry holds a response or an error.
    pub async fn settled(&mut self) -> Option<Entry> {
        loop {
            let current = self.changes.borrow_and_update().entry.clone();
            if current.is_settled() {
                return Some(current);
            }
            self.changed().await?;
        }
    }

    fn invalidated(&self) -> bool {
        match (&self.invalidate, &self.source) {
            (Some(predicate), Source::Request(request)) => predicate(request),
            _ => false,
        }
    }

    fn subscribe(&mut self) {
        if self.subscription.is_some() {
            return;
        }
        let local = Arc::clone(&self.local);
        let handle = self
            .store
            .subscribe(self.key.clone(), move |entry: &Entry| accept(&local, entry));
        self.subscription = Some(handle);

        // The key may have settled between construction and registration.
        if let Some(entry) = self.store.entry(&self.key) {
            if self.local.borrow().entry != entry {
                accept(&self.local, &entry);
            }
        }
    }

    // Re-reads the local entry for the current key and suspend mode.
    fn reset_local(&mut self) {
        let entry = self.store.entry(&self.key).unwrap_or_else(|| {
            if self.suspend {
                Entry::idle()
            } else {
                Entry::loading()
            }
        });
        self.local.send_modify(|local| {
            local.entry = entry;
            local.generation += 1;
        });
    }
}

// Takes `entry` as the new local entry unless it is a loading notification
// for an entry that is already loading.
fn accept(local: &watch::Sender<Local>, entry: &Entry) {
    local.send_if_modified(|current| {
        if entry.is_loading && current.entry.is_loading {
            return false;
        }
        current.entry = entry.clone();
        current.generation += 1;
        true
    });
}

impl Drop for Query {
    fn drop(&mut self) {
        if let Some(handle) = self.subscription.take() {
            self.store.unsubscribe(&self.key, handle);
        }
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("key", &self.key)
            .field("suspend", &self.suspend)
            .field("entry", &self.local.borrow().entry)
            .finish()
    }
}
