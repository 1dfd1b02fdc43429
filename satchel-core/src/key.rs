//! Composite keys for cached and in-flight requests.
//!
//! A [`CacheKey`] is a namespace prefix plus an ordered list of [`KeyPart`]s.
//! The request client builds two kinds of keys from the same request:
//!
//! - a **cache key** (`method`, `url`, `query`), used for the response cache;
//! - a **request key** (the cache key parts plus `body`), used for single-flight
//!   de-duplication of in-flight calls.
//!
//! ## Format
//!
//! When displayed, keys follow `{prefix}:key1=value1&key2=value2`.
//! The prefix is omitted if empty, and a part without value is printed as its key only.
//!
//! ```
//! use satchel_core::{CacheKey, KeyPart};
//!
//! let key = CacheKey::new("cache", vec![
//!     KeyPart::new("method", Some("GET")),
//!     KeyPart::new("url", Some("/api/chapters")),
//! ]);
//! assert_eq!(key.to_string(), "cache:method=GET&url=/api/chapters");
//!
//! let key = CacheKey::new("", vec![KeyPart::new("flag", None::<&str>)]);
//! assert_eq!(key.to_string(), "flag");
//! ```
//!
//! Equality and hashing use the structured parts, never the display string,
//! so values containing `&` or `=` cannot collide.

use smol_str::SmolStr;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct CacheKeyInner {
    prefix: SmolStr,
    parts: Vec<KeyPart>,
}

/// A key identifying a cached entry or an in-flight request.
///
/// `CacheKey` wraps its data in [`Arc`], so `clone()` only bumps a reference
/// count. Keys are cloned into the pending-request map and the response cache.
#[derive(Clone, Debug)]
pub struct CacheKey {
    inner: Arc<CacheKeyInner>,
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner == other.inner
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.inner.prefix.is_empty() {
            write!(f, "{}:", self.inner.prefix)?;
        }
        for (i, part) in self.inner.parts.iter().enumerate() {
            if i > 0 {
                write!(f, "&")?;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

impl CacheKey {
    /// Creates a new key with the given prefix and parts.
    pub fn new(prefix: impl Into<SmolStr>, parts: Vec<KeyPart>) -> Self {
        CacheKey {
            inner: Arc::new(CacheKeyInner {
                prefix: prefix.into(),
                parts,
            }),
        }
    }

    /// Creates a key without prefix from a slice of key-value pairs.
    pub fn from_slice(parts: &[(&str, Option<&str>)]) -> Self {
        let parts = parts
            .iter()
            .map(|(key, value)| KeyPart::new(key, *value))
            .collect();
        Self::new(SmolStr::default(), parts)
    }

    /// Returns the key prefix.
    pub fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    /// Returns an iterator over the key parts.
    pub fn parts(&self) -> impl Iterator<Item = &KeyPart> {
        self.inner.parts.iter()
    }

    /// Returns a new key with a different prefix and `extra` appended to the parts.
    ///
    /// Used to derive a request key from a cache key.
    pub fn extend(
        &self,
        prefix: impl Into<SmolStr>,
        extra: impl IntoIterator<Item = KeyPart>,
    ) -> Self {
        let mut parts = self.inner.parts.clone();
        parts.extend(extra);
        Self::new(prefix, parts)
    }
}

/// A single component of a [`CacheKey`].
///
/// Both key and value use [`SmolStr`], so short components like `method=GET`
/// stay inline without heap allocation.
///
/// ```
/// use satchel_core::KeyPart;
///
/// let method = KeyPart::new("method", Some("GET"));
/// assert_eq!(method.key(), "method");
/// assert_eq!(method.value(), Some("GET"));
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct KeyPart {
    key: SmolStr,
    value: Option<SmolStr>,
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        if let Some(ref value) = self.value {
            write!(f, "={}", value)?;
        }
        Ok(())
    }
}

impl KeyPart {
    /// Creates a new key part.
    pub fn new<K: AsRef<str>, V: AsRef<str>>(key: K, value: Option<V>) -> Self {
        KeyPart {
            key: SmolStr::new(key),
            value: value.map(SmolStr::new),
        }
    }

    /// Returns the key name.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the optional value.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}
