//! Per-key entry state and the immutable snapshot of all entries.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::Value;

use crate::error::OperationError;
use crate::key::CacheKey;
use crate::response::Response;

/// The loading/settled state held for one key.
///
/// While `is_loading` is `true`, `response` and `error` are always `None`:
/// a dispatch drops whatever the key held before.
#[derive(Debug, Clone, Default)]
pub struct Entry {
    pub is_loading: bool,
    pub response: Option<Arc<Response>>,
    /// Set when the operation failed; `response` is then `None`.
    pub error: Option<Arc<OperationError>>,
}

impl Entry {
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            response: None,
            error: None,
        }
    }

    /// Neither loading nor settled, e.g. a suspended query before its first trigger.
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn settled(response: Response) -> Self {
        Self {
            is_loading: false,
            response: Some(Arc::new(response)),
            error: None,
        }
    }

    pub fn failed(error: OperationError) -> Self {
        Self {
            is_loading: false,
            response: None,
            error: Some(Arc::new(error)),
        }
    }

    /// `true` once the entry holds a response or an error.
    pub fn is_settled(&self) -> bool {
        !self.is_loading && (self.response.is_some() || self.error.is_some())
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_deref()
    }

    pub fn error(&self) -> Option<&OperationError> {
        self.error.as_deref()
    }
}

// Errors compare by identity: two entries are equal only if they carry the
// very same failure.
impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        let errors_eq = match (&self.error, &other.error) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        self.is_loading == other.is_loading && self.response == other.response && errors_eq
    }
}

impl Serialize for Entry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = 1 + usize::from(self.response.is_some()) + usize::from(self.error.is_some());
        let mut s = serializer.serialize_struct("Entry", fields)?;
        s.serialize_field("isLoading", &self.is_loading)?;
        if let Some(response) = &self.response {
            s.serialize_field("response", response.as_ref())?;
        }
        if let Some(error) = &self.error {
            s.serialize_field("error", &error.to_string())?;
        }
        s.end()
    }
}

/// One immutable version of the store's entry map.
///
/// Every store mutation installs a new snapshot, so a consumer can detect
/// change by comparing the snapshot it holds against [`Store::get_state`]
/// with [`Snapshot::ptr_eq`].
///
/// [`Store::get_state`]: crate::Store::get_state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot(Arc<HashMap<CacheKey, Entry>>);

impl Snapshot {
    pub fn new(entries: HashMap<CacheKey, Entry>) -> Self {
        Self(Arc::new(entries))
    }

    /// `true` if both handles refer to the same version.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// A new version with `key` replaced by `entry`; `self` is untouched.
    pub(crate) fn with_entry(&self, key: CacheKey, entry: Entry) -> Self {
        let mut next = HashMap::clone(&self.0);
        next.insert(key, entry);
        Self(Arc::new(next))
    }

    /// Renders the snapshot as a JSON object keyed by the display form of each key.
    ///
    /// JSON object keys are strings, so `Int(1)` and `Text("1")` render to the
    /// same member; if a snapshot holds both, only one of them appears. Use the
    /// map itself (through `Deref`) when the distinction matters.
    pub fn to_json(&self) -> Value {
        let map = self
            .0
            .iter()
            .map(|(key, entry)| {
                let value = serde_json::to_value(entry).unwrap_or(Value::Null);
                (key.to_string(), value)
            })
            .collect();
        Value::Object(map)
    }
}

impl Deref for Snapshot {
    type Target = HashMap<CacheKey, Entry>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_entry_has_no_payload() {
        let e = Entry::loading();
        assert!(e.is_loading);
        assert!(e.response().is_none());
        assert!(!e.is_settled());
    }

    #[test]
    fn with_entry_builds_a_new_version() {
        let v1 = Snapshot::default();
        let v2 = v1.with_entry("a".into(), Entry::loading());
        assert!(v1.is_empty());
        assert_eq!(v2.len(), 1);
        assert!(!v1.ptr_eq(&v2));
        assert!(v2.ptr_eq(&v2.clone()));
    }

    #[test]
    fn serializes_like_the_inspector_expects() {
        let snapshot = Snapshot::default()
            .with_entry("GET /a".into(), Entry::loading())
            .with_entry("GET /b".into(), Entry::settled(Response::ok("Test")));
        assert_eq!(
            snapshot.to_json(),
            serde_json::json!({
                "GET /a": { "isLoading": true },
                "GET /b": {
                    "isLoading": false,
                    "response": { "status": 200, "data": "Test", "headers": [] }
                }
            })
        );
    }

    #[test]
    fn integer_keys_render_in_decimal() {
        let snapshot = Snapshot::default().with_entry(CacheKey::Int(-7), Entry::loading());
        assert_eq!(snapshot.to_json(), serde_json::json!({ "-7": { "isLoading": true } }));
    }

    #[test]
    fn failed_entries_compare_by_identity() {
        let a = Entry::failed(OperationError::producer("boom"));
        let b = Entry::failed(OperationError::producer("boom"));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
