//! Cache key derivation.
//!
//! A [`CacheKey`] correlates a request with its entry. Keys compare by exact
//! equality; the only normalization is whatever the [`KeyDeriver`] applies.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::http::FetchRequest;

/// A text or integer cache key.
///
/// `Text("1")` and `Int(1)` are distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheKey {
    Int(i64),
    Text(String),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for CacheKey {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

/// Maps a request descriptor to the key its result is cached under.
///
/// Implementations must be pure: equal requests yield equal keys. Any
/// `Fn(&FetchRequest) -> CacheKey` is a deriver, which is how callers key on a
/// semantic identity instead of the literal request text.
///
/// ```
/// use fetchcache::http::FetchRequest;
/// use fetchcache::key::{CacheKey, KeyDeriver};
///
/// // Ignore query parameters.
/// let by_path = |req: &FetchRequest| {
///     CacheKey::from(req.target.split('?').next().unwrap_or_default())
/// };
/// assert_eq!(by_path.derive(&FetchRequest::new("/p/1?v=2")), CacheKey::from("/p/1"));
/// ```
pub trait KeyDeriver: Send + Sync {
    fn derive(&self, request: &FetchRequest) -> CacheKey;
}

impl<F> KeyDeriver for F
where
    F: Fn(&FetchRequest) -> CacheKey + Send + Sync,
{
    fn derive(&self, request: &FetchRequest) -> CacheKey {
        (self)(request)
    }
}

/// Keys a request as `"<METHOD> <TARGET>"`, with `GET` for an absent method.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultKeyDeriver;

impl KeyDeriver for DefaultKeyDeriver {
    fn derive(&self, request: &FetchRequest) -> CacheKey {
        CacheKey::Text(format!("{} {}", request.method(), request.target))
    }
}

/// Shorthand for [`DefaultKeyDeriver`].
pub fn default_key(request: &FetchRequest) -> CacheKey {
    DefaultKeyDeriver.derive(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::FetchOptions;

    #[test]
    fn default_key_uses_get_when_method_is_absent() {
        let key = default_key(&FetchRequest::new("https://api.github.com/projects/1"));
        assert_eq!(key, CacheKey::from("GET https://api.github.com/projects/1"));
    }

    #[test]
    fn default_key_includes_explicit_method() {
        let req = FetchRequest::with_options("/p/1", FetchOptions::new().method("DELETE"));
        assert_eq!(default_key(&req).to_string(), "DELETE /p/1");
    }

    #[test]
    fn derivation_is_deterministic() {
        let req = FetchRequest::with_options("/p/1", FetchOptions::new().header("X-A", "1"));
        assert_eq!(default_key(&req), default_key(&req.clone()));
    }

    #[test]
    fn text_and_int_keys_are_distinct() {
        assert_ne!(CacheKey::from("1"), CacheKey::Int(1));
        assert_eq!(CacheKey::Int(1).to_string(), "1");
    }

    #[test]
    fn custom_deriver_keys_on_identity() {
        let by_id = |_: &FetchRequest| CacheKey::Int(42);
        assert_eq!(by_id.derive(&FetchRequest::new("/anything")), CacheKey::Int(42));
    }
}
