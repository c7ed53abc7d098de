//! The cache store: per-key entries, per-key observers, and the dispatch
//! protocol that moves an entry from loading to settled.
//!
//! A [`Store`] is an explicitly constructed, cheaply cloneable handle. Every
//! clone refers to the same entries and observers, so consumers share one
//! store by passing the handle around.
//!
//! Each transition replaces the whole entry map with a new [`Snapshot`] and
//! then notifies the observers registered for the affected key, in
//! registration order. Transitions are delivered one at a time and in the
//! order they were installed, so the last entry an observer receives is the
//! one the store holds. Observers run outside the state lock and may call
//! back into the store; a transition started from inside an observer
//! supersedes the one being delivered, whose remaining observers are skipped.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use parking_lot::ReentrantMutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::config::CacheConfig;
use crate::http::{BoxFuture, HttpTransport, Transport};
use crate::inspect::{Inspector, TracingInspector, Transition};
use crate::key::CacheKey;

pub mod entry;
pub mod operation;

pub use entry::{Entry, Snapshot};
pub use operation::{Operation, Outcome, Producer};

use crate::error::OperationError;

/// A callback invoked with the new entry whenever its key changes.
pub type Observer = Arc<dyn Fn(&Entry) + Send + Sync + 'static>;

/// Identifies one observer registration, for [`Store::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

struct Registration {
    handle: ObserverHandle,
    observer: Observer,
}

#[derive(Default)]
struct State {
    entries: Snapshot,
    // Per-key count of installed transitions.
    revisions: HashMap<CacheKey, u64>,
    observers: HashMap<CacheKey, Vec<Registration>>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    inspector: Option<Arc<dyn Inspector>>,
    state: Mutex<State>,
    // Held from install through notification.
    delivery: ReentrantMutex<()>,
    next_handle: AtomicU64,
}

/// Shared request-deduplication cache.
///
/// # Examples
///
/// ```
/// use fetchcache::{CacheKey, Operation, Response, Store};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = Store::default();
/// let key = CacheKey::from("answer");
///
/// store.subscribe(key.clone(), |entry| println!("loading: {}", entry.is_loading));
/// store
///     .dispatch(Operation::produce(|| async { Ok(Response::ok("42")) }), key.clone())
///     .await
///     .unwrap();
///
/// let entry = store.entry(&key).unwrap();
/// assert_eq!(entry.response().unwrap().data(), "42");
/// # }
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

impl Store {
    /// Creates an empty store backed by `transport`.
    pub fn new(transport: impl Transport) -> Self {
        Self::builder(transport).build()
    }

    /// Creates a store pre-seeded with `initial` entries.
    pub fn with_state(transport: impl Transport, initial: HashMap<CacheKey, Entry>) -> Self {
        Self::builder(transport).initial_state(initial).build()
    }

    pub fn builder(transport: impl Transport) -> StoreBuilder {
        StoreBuilder {
            transport: Arc::new(transport),
            inspector: None,
            initial: HashMap::new(),
        }
    }

    /// An [`HttpTransport`]-backed store, with a [`TracingInspector`] if enabled.
    pub fn from_config(config: &CacheConfig) -> Self {
        let mut builder = Self::builder(HttpTransport::new(config.client.clone()));
        if config.inspector.enabled {
            builder = builder.inspector(TracingInspector::new(config.inspector.name.clone()));
        }
        builder.build()
    }

    /// Returns the current snapshot of every entry.
    pub fn get_state(&self) -> Snapshot {
        self.lock().entries.clone()
    }

    /// Returns the current entry for `key`, if one was ever created.
    pub fn entry(&self, key: &CacheKey) -> Option<Entry> {
        self.lock().entries.get(key).cloned()
    }

    /// Registers `observer` for changes to `key`'s entry.
    ///
    /// Registrations are not de-duplicated: registering the same callback
    /// twice gets it invoked twice per change. Observers must not block:
    /// transitions for this store wait until they return.
    pub fn subscribe<F>(&self, key: impl Into<CacheKey>, observer: F) -> ObserverHandle
    where
        F: Fn(&Entry) + Send + Sync + 'static,
    {
        let key = key.into();
        let handle = ObserverHandle(self.inner.next_handle.fetch_add(1, Ordering::Relaxed));
        trace!(%key, handle = handle.0, "observer registered");
        self.lock()
            .observers
            .entry(key)
            .or_default()
            .push(Registration {
                handle,
                observer: Arc::new(observer),
            });
        handle
    }

    /// Removes one registration. Returns `false` if it was not registered for `key`.
    pub fn unsubscribe(&self, key: &CacheKey, handle: ObserverHandle) -> bool {
        let mut state = self.lock();
        let Some(list) = state.observers.get_mut(key) else {
            return false;
        };
        let before = list.len();
        list.retain(|r| r.handle != handle);
        let removed = list.len() < before;
        if list.is_empty() {
            state.observers.remove(key);
        }
        removed
    }

    /// Number of observers currently registered for `key`.
    pub fn observer_count(&self, key: &CacheKey) -> usize {
        self.lock().observers.get(key).map_or(0, Vec::len)
    }

    /// Starts `operation` for `key`.
    ///
    /// Before returning, the entry is set to loading and the key's observers
    /// are notified. The operation then runs on a spawned task; when it
    /// completes the entry is replaced with the settled (or failed) result
    /// and the observers registered at that moment are notified.
    ///
    /// Dispatch never checks for an in-flight operation on the same key: two
    /// concurrent dispatches both run and the one that completes last wins.
    /// The returned handle only awaits completion.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn dispatch(&self, operation: Operation, key: impl Into<CacheKey>) -> JoinHandle<()> {
        let key = key.into();
        debug!(%key, kind = operation.kind(), "dispatching");

        self.apply(&key, Entry::loading(), Transition::Loading);

        let pending = self.invoke(operation);
        let store = self.clone();
        tokio::spawn(async move {
            match pending.await {
                Ok(outcome) => {
                    let response = outcome.into_response();
                    debug!(%key, status = response.status(), "settled");
                    store.apply(&key, Entry::settled(response), Transition::Update);
                }
                Err(e) => {
                    warn!(%key, error = %e, "operation failed");
                    store.apply(&key, Entry::failed(e), Transition::Failed);
                }
            }
        })
    }

    // Calls the operation, yielding the future of its outcome.
    fn invoke(&self, operation: Operation) -> BoxFuture<Result<Outcome, OperationError>> {
        match operation {
            Operation::Fetch(request) => {
                let fetch = self.inner.transport.fetch(request);
                Box::pin(async move { Ok::<_, OperationError>(Outcome::Network(fetch.await?)) })
            }
            Operation::Produce(producer) => {
                let produce = producer();
                Box::pin(async move { produce.await.map(Outcome::Produced) })
            }
        }
    }

    // Installs a new snapshot with `key` replaced, then reports and notifies.
    fn apply(&self, key: &CacheKey, entry: Entry, transition: Transition) {
        let _delivery = self.inner.delivery.lock();

        let (revision, snapshot, observers) = {
            let mut state = self.lock();
            state.entries = state.entries.with_entry(key.clone(), entry.clone());
            let revision = state.revisions.entry(key.clone()).or_default();
            *revision += 1;
            let revision = *revision;
            let observers: Vec<Observer> = state
                .observers
                .get(key)
                .map(|list| list.iter().map(|r| Arc::clone(&r.observer)).collect())
                .unwrap_or_default();
            (revision, state.entries.clone(), observers)
        };

        if let Some(inspector) = &self.inner.inspector {
            inspector.send(&transition.label(key), &snapshot);
        }

        trace!(%key, %transition, observers = observers.len(), "notifying");
        for observer in observers {
            if self.revision(key) != revision {
                trace!(%key, %transition, "superseded during delivery");
                break;
            }
            observer(&entry);
        }
    }

    fn revision(&self, key: &CacheKey) -> u64 {
        self.lock().revisions.get(key).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Observers never run under the state lock, so a poisoned lock still holds consistent state.
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Store")
            .field("entries", &state.entries.len())
            .field("observed_keys", &state.observers.len())
            .field("inspector", &self.inner.inspector.is_some())
            .finish()
    }
}

/// Configures a [`Store`] before construction.
pub struct StoreBuilder {
    transport: Arc<dyn Transport>,
    inspector: Option<Arc<dyn Inspector>>,
    initial: HashMap<CacheKey, Entry>,
}

impl StoreBuilder {
    /// Attaches a debug/introspection hook.
    #[must_use]
    pub fn inspector(mut self, inspector: impl Inspector) -> Self {
        self.inspector = Some(Arc::new(inspector));
        self
    }

    #[must_use]
    pub fn initial_state(mut self, initial: HashMap<CacheKey, Entry>) -> Self {
        self.initial = initial;
        self
    }

    pub fn build(self) -> Store {
        Store {
            inner: Arc::new(Inner {
                transport: self.transport,
                inspector: self.inspector,
                state: Mutex::new(State {
                    entries: Snapshot::new(self.initial),
                    revisions: HashMap::new(),
                    observers: HashMap::new(),
                }),
                delivery: ReentrantMutex::new(()),
                next_handle: AtomicU64::new(0),
            }),
        }
    }
}
