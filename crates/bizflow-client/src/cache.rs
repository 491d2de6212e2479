//! # Query Cache
//!
//! Cached server query results with lazy, prefix-based invalidation.
//!
//! ## Lazy Pull
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Invalidation Is Lazy                              │
//! │                                                                         │
//! │  ORDER_CREATED ──► invalidate(["orders"])                               │
//! │                     │                                                   │
//! │                     └─► ["orders"]          fresh → STALE               │
//! │                         ["orders","page=2"] fresh → STALE               │
//! │                         (no request is sent)                            │
//! │                                                                         │
//! │  orders screen ──► get_or_fetch(["orders"], fetch)                      │
//! │                     │                                                   │
//! │                     └─► stale → fetch() → store fresh → return          │
//! │                                                                         │
//! │  A fetch that started before an invalidation covering its key stores   │
//! │  its result already stale, so the next read fetches again.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Re-invalidating a stale key changes nothing, which is why arrival order
//! of events does not matter for correctness.

use bizflow_core::CacheKey;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::error::ClientResult;

type CachedValue = Arc<dyn Any + Send + Sync>;

struct Entry {
    value: CachedValue,
    stale: bool,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<CacheKey, Entry>,
    /// Bumped on every invalidation.
    generation: u64,
    /// Last generation at which each prefix was invalidated.
    invalidated_at: HashMap<CacheKey, u64>,
}

impl CacheInner {
    fn invalidated_since(&self, key: &CacheKey, generation: u64) -> bool {
        self.invalidated_at
            .iter()
            .any(|(prefix, at)| *at > generation && key.starts_with(prefix))
    }
}

/// Shared query cache. Clones refer to the same entries.
#[derive(Clone, Default)]
pub struct QueryCache {
    inner: Arc<Mutex<CacheInner>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached value if fresh, otherwise runs `fetch` and caches
    /// its result.
    ///
    /// A failed fetch leaves any previous (stale) value in place.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: CacheKey, fetch: F) -> ClientResult<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let started_at = {
            let inner = self.lock();
            if let Some(entry) = inner.entries.get(&key) {
                if !entry.stale {
                    if let Ok(value) = Arc::clone(&entry.value).downcast::<T>() {
                        return Ok(value);
                    }
                }
            }
            inner.generation
        };

        debug!(key = %key, "Fetching query");
        let value = Arc::new(fetch().await?);

        let mut inner = self.lock();
        let stale = inner.invalidated_since(&key, started_at);
        if stale {
            debug!(key = %key, "Query invalidated while in flight");
        }
        inner.entries.insert(
            key,
            Entry {
                value: value.clone(),
                stale,
            },
        );
        Ok(value)
    }

    /// Stores a fresh value.
    pub fn set<T: Any + Send + Sync>(&self, key: CacheKey, value: T) {
        self.lock().entries.insert(
            key,
            Entry {
                value: Arc::new(value),
                stale: false,
            },
        );
    }

    /// Cached value regardless of staleness, without fetching.
    pub fn peek<T: Any + Send + Sync>(&self, key: &CacheKey) -> Option<Arc<T>> {
        let inner = self.lock();
        let entry = inner.entries.get(key)?;
        Arc::clone(&entry.value).downcast::<T>().ok()
    }

    /// Marks every entry under `prefix` stale. Does not fetch.
    ///
    /// Returns how many entries went from fresh to stale.
    pub fn invalidate(&self, prefix: &CacheKey) -> usize {
        let mut inner = self.lock();
        inner.generation += 1;
        let generation = inner.generation;
        inner.invalidated_at.insert(prefix.clone(), generation);

        let mut newly_stale = 0;
        for (key, entry) in inner.entries.iter_mut() {
            if key.starts_with(prefix) && !entry.stale {
                entry.stale = true;
                newly_stale += 1;
            }
        }
        debug!(prefix = %prefix, newly_stale, "Invalidated queries");
        newly_stale
    }

    /// `None` if the key was never cached.
    pub fn is_stale(&self, key: &CacheKey) -> Option<bool> {
        self.lock().entries.get(key).map(|e| e.stale)
    }

    pub fn stale_keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<_> = self
            .lock()
            .entries
            .iter()
            .filter(|(_, e)| e.stale)
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Drops every entry (logout).
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.invalidated_at.clear();
    }
}
