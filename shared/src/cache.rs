//! Normalised query cache shared by page controllers.
//!
//! Values are stored as JSON so that any query result can live in one
//! bounded LRU. Every write bumps a global revision; derived data (the
//! merged thread, for one) is memoised on the revision of the entry it was
//! computed from.

use lru::LruCache;
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

use crate::DEFAULT_MAX_CACHED_QUERIES;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("no cached result for {key}")]
    Miss { key: String },

    #[error("failed to encode cached value for {key}: {message}")]
    Encode { key: String, message: String },

    #[error("cached value for {key} does not match the expected shape: {message}")]
    Decode { key: String, message: String },
}

/// Operation name plus canonical JSON of its variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    operation: String,
    variables: String,
}

impl CacheKey {
    pub fn new<V: Serialize>(operation: &str, variables: &V) -> Result<Self, CacheError> {
        let variables = serde_json::to_string(variables).map_err(|e| CacheError::Encode {
            key: operation.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            operation: operation.to_string(),
            variables,
        })
    }

    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.operation, self.variables)
    }
}

/// A decoded cache value together with the revision it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub data: T,
    pub revision: u64,
}

struct CacheEntry {
    value: serde_json::Value,
    revision: u64,
}

struct Inner {
    entries: LruCache<CacheKey, CacheEntry>,
    next_revision: u64,
}

impl Inner {
    fn bump(&mut self) -> u64 {
        self.next_revision += 1;
        self.next_revision
    }
}

/// Cloning yields another handle onto the same store.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<RwLock<Inner>>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CACHED_QUERIES)
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("QueryCache")
            .field("len", &inner.entries.len())
            .field("capacity", &inner.entries.cap())
            .field("revision", &inner.next_revision)
            .finish()
    }
}

impl QueryCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(RwLock::new(Inner {
                entries: LruCache::new(capacity),
                next_revision: 0,
            })),
        }
    }

    /// Decodes a fresh copy; callers never observe the stored value itself.
    pub fn read<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Cached<T>, CacheError> {
        let inner = self.inner.read();
        let entry = inner.entries.peek(key).ok_or_else(|| CacheError::Miss {
            key: key.to_string(),
        })?;
        let data = T::deserialize(&entry.value).map_err(|e| CacheError::Decode {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(Cached {
            data,
            revision: entry.revision,
        })
    }

    #[must_use]
    pub fn revision(&self, key: &CacheKey) -> Option<u64> {
        self.inner.read().entries.peek(key).map(|e| e.revision)
    }

    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.read().entries.contains(key)
    }

    pub fn write<T: Serialize>(&self, key: &CacheKey, data: &T) -> Result<u64, CacheError> {
        let value = serde_json::to_value(data).map_err(|e| CacheError::Encode {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        let mut inner = self.inner.write();
        let revision = inner.bump();
        if let Some((evicted, _)) = inner.entries.push(key.clone(), CacheEntry { value, revision }) {
            if &evicted != key {
                debug!(key = %evicted, "evicted least recently used query");
            }
        }
        trace!(%key, revision, "cache write");
        Ok(revision)
    }

    /// Read-modify-write under one write guard. `f` works on a decoded
    /// private copy; nothing is stored if decoding or encoding fails.
    pub fn patch<T, F>(&self, key: &CacheKey, f: F) -> Result<u64, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T),
    {
        let mut inner = self.inner.write();

        let entry = inner.entries.get(key).ok_or_else(|| CacheError::Miss {
            key: key.to_string(),
        })?;
        let mut data = T::deserialize(&entry.value).map_err(|e| CacheError::Decode {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        f(&mut data);

        let value = serde_json::to_value(&data).map_err(|e| CacheError::Encode {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        let revision = inner.bump();
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.value = value;
            entry.revision = revision;
        }
        trace!(%key, revision, "cache patch");
        Ok(revision)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn resize(&self, capacity: usize) {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        self.inner.write().entries.resize(capacity);
    }

    /// Whether two handles point at the same store.
    #[must_use]
    pub fn shares_store_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
