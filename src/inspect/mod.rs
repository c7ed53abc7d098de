//! Debug/introspection hook.
//!
//! An [`Inspector`] attached at store construction receives every entry
//! replacement, labeled `"LOADING <key>"`, `"UPDATE <key>"` or
//! `"FAILED <key>"`, together with the new snapshot. Inspection is purely
//! observational; a store without one behaves identically.

use std::fmt;

use tracing::{Level, debug, enabled};

use crate::key::CacheKey;
use crate::store::Snapshot;

/// The kind of transition being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Loading,
    Update,
    Failed,
}

impl Transition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "LOADING",
            Self::Update => "UPDATE",
            Self::Failed => "FAILED",
        }
    }

    /// The label reported for `key`, e.g. `"UPDATE GET /p/1"`.
    pub fn label(self, key: &CacheKey) -> String {
        format!("{} {key}", self.as_str())
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives entry replacements.
///
/// Called after the store has installed the new snapshot and before
/// observers are notified. Must not block.
pub trait Inspector: Send + Sync + 'static {
    fn send(&self, label: &str, state: &Snapshot);
}

impl<F> Inspector for F
where
    F: Fn(&str, &Snapshot) + Send + Sync + 'static,
{
    fn send(&self, label: &str, state: &Snapshot) {
        (self)(label, state)
    }
}

/// Reports transitions as `tracing` debug events, with the snapshot as JSON.
#[derive(Debug, Clone)]
pub struct TracingInspector {
    name: String,
}

impl TracingInspector {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Inspector for TracingInspector {
    fn send(&self, label: &str, state: &Snapshot) {
        if !enabled!(target: "fetchcache::inspect", Level::DEBUG) {
            return;
        }
        let state = serde_json::to_string(&state.to_json()).unwrap_or_default();
        debug!(target: "fetchcache::inspect", name = %self.name, label, %state, "store transition");
    }
}
