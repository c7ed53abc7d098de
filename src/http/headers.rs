//! Ordered header list with case-insensitive name lookup.
//!
//! Entries are kept exactly as the source produced them: no sorting, no
//! merging, no case folding of the stored names. Lookup helpers compare names
//! case-insensitively per RFC 9110 §5.

use serde::{Deserialize, Serialize};

/// An ordered list of `(name, value)` header pairs.
///
/// Iteration order is insertion order, so a list built from a platform header
/// collection reproduces that collection's iteration order.
///
/// # Examples
///
/// ```
/// use fetchcache::http::Headers;
///
/// let headers: Headers = [("Content-Type", "application/json"), ("X-Page", "1"), ("X-Page", "2")]
///     .into_iter()
///     .collect();
///
/// assert_eq!(headers.get("content-type"), Some("application/json"));
/// let pages: Vec<_> = headers.get_all("x-page").collect();
/// assert_eq!(pages, vec!["1", "2"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers {
    inner: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a header list with pre-allocated capacity for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    /// Appends a header entry. Multiple values for the same name are preserved.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Returns the first value for the given header name (case-insensitive), or `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns an iterator over all values for the given header name (case-insensitive).
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.inner
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` if the list contains at least one entry with the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Returns the total number of entries (not unique names).
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over all `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<N, V> FromIterator<(N, V)> for Headers
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        headers.extend(iter);
        headers
    }
}

impl<N, V> Extend<(N, V)> for Headers
where
    N: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (N, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.insert(name, value);
        }
    }
}

impl IntoIterator for Headers {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_get() {
        let mut h = Headers::new();
        h.insert("Content-Type", "text/plain");
        assert_eq!(h.get("content-type"), Some("text/plain"));
        assert_eq!(h.get("CONTENT-TYPE"), Some("text/plain"));
    }

    #[test]
    fn stored_names_keep_their_case() {
        let h: Headers = [("x-LOWER-upper", "1")].into_iter().collect();
        assert_eq!(h.iter().next(), Some(("x-LOWER-upper", "1")));
    }

    #[test]
    fn collect_preserves_source_order() {
        let source = vec![("b", "2"), ("a", "1"), ("c", "3"), ("a", "4")];
        let h: Headers = source.clone().into_iter().collect();
        let names: Vec<_> = h.iter().collect();
        assert_eq!(names, source);
    }

    #[test]
    fn serializes_as_list_of_pairs() {
        let h: Headers = [("Content-Type", "application/json")].into_iter().collect();
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, r#"[["Content-Type","application/json"]]"#);
    }
}
