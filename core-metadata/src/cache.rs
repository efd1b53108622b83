//! # Cached Service
//!
//! TTL cache with in-flight request de-duplication.
//!
//! [`CachedService::get_or_fetch`] answers from a fresh entry when it can.
//! Otherwise it joins the fetch already running for the same key, or starts
//! a new one. Every caller waiting on the same key gets the result of one
//! fetcher call.
//!
//! Only successes are cached. A failed fetch is handed to everyone waiting on
//! it and the next call starts over.
//!
//! Fetches run on their own task, so a fetch keeps going, and settles, even
//! if every caller waiting on it is dropped.
//!
//! ```rust
//! use bridge_traits::SystemClock;
//! use core_metadata::CachedService;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> core_metadata::Result<()> {
//! let cache: CachedService<String, u32> =
//!     CachedService::new("answers", Duration::from_secs(60), Arc::new(SystemClock));
//!
//! let value = cache.get_or_fetch("life".to_string(), || async { Ok(42) }).await?;
//! assert_eq!(value, 42);
//! assert!(cache.has(&"life".to_string()));
//! # Ok(())
//! # }
//! ```

use bridge_traits::time::Clock;
use chrono::{DateTime, Utc};
use core_async::task;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::{MetadataError, Result};

/// A cached value and when it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub timestamp: DateTime<Utc>,
}

type PendingFetch<V> = Shared<BoxFuture<'static, Result<V>>>;

struct Pending<V> {
    id: u64,
    fetch: PendingFetch<V>,
}

struct CacheState<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    /// Present only between fetch start and settlement.
    pending: HashMap<K, Pending<V>>,
    next_fetch: u64,
}

struct CacheInner<K, V> {
    name: &'static str,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState<K, V>>,
}

impl<K, V> CacheInner<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn is_fresh(&self, entry: &CacheEntry<V>) -> bool {
        match (self.clock.now() - entry.timestamp).to_std() {
            Ok(age) => age < self.ttl,
            // Stored "in the future": the clock went backwards
            Err(_) => true,
        }
    }

    fn store(&self, key: &K, value: &V) {
        self.state.lock().entries.insert(
            key.clone(),
            CacheEntry {
                value: value.clone(),
                timestamp: self.clock.now(),
            },
        );
    }

    /// Forget fetch `id` for `key`; a newer fetch for the key is left alone.
    fn release(&self, key: &K, id: u64) {
        let mut state = self.state.lock();
        if state.pending.get(key).is_some_and(|pending| pending.id == id) {
            state.pending.remove(key);
        }
    }
}

/// Releases a fetch's pending slot when its task finishes, panics or is
/// aborted.
struct PendingSlot<K: Eq + Hash + Clone, V: Clone> {
    inner: Arc<CacheInner<K, V>>,
    key: K,
    id: u64,
}

impl<K: Eq + Hash + Clone, V: Clone> Drop for PendingSlot<K, V> {
    fn drop(&mut self) {
        self.inner.release(&self.key, self.id);
    }
}

/// Generic TTL cache keyed by `K`.
pub struct CachedService<K, V> {
    inner: Arc<CacheInner<K, V>>,
}

impl<K, V> Clone for CachedService<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> CachedService<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// `name` only appears in logs.
    pub fn new(name: &'static str, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                name,
                ttl,
                clock,
                state: Mutex::new(CacheState {
                    entries: HashMap::new(),
                    pending: HashMap::new(),
                    next_fetch: 0,
                }),
            }),
        }
    }

    /// Fresh cached value, the in-flight fetch for `key`, or a new fetch.
    ///
    /// `fetcher` is only called when a new fetch has to start. It runs while
    /// the cache bookkeeping is locked and must only build the future, not
    /// call back into this cache. The future is spawned onto the runtime, so
    /// this must be called from within one.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetcher: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let fetch = {
            let mut state = self.inner.state.lock();

            if let Some(entry) = state.entries.get(&key) {
                if self.inner.is_fresh(entry) {
                    trace!(cache = self.inner.name, key = ?key, "Cache hit");
                    return Ok(entry.value.clone());
                }
                debug!(cache = self.inner.name, key = ?key, "Cache entry expired");
                state.entries.remove(&key);
            }

            if let Some(pending) = state.pending.get(&key) {
                debug!(cache = self.inner.name, key = ?key, "Joining in-flight fetch");
                pending.fetch.clone()
            } else {
                debug!(cache = self.inner.name, key = ?key, "Cache miss, fetching");
                let id = state.next_fetch;
                state.next_fetch += 1;

                let slot = PendingSlot {
                    inner: Arc::clone(&self.inner),
                    key: key.clone(),
                    id,
                };
                let request = fetcher();
                let handle = task::spawn(async move {
                    let result = request.await;
                    if let Ok(value) = &result {
                        slot.inner.store(&slot.key, value);
                    }
                    drop(slot);
                    result
                });

                let name = self.inner.name;
                let fetch = async move {
                    handle.await.unwrap_or_else(|err| {
                        Err(MetadataError::FetchFailed(format!(
                            "{name} fetch did not complete: {err}"
                        )))
                    })
                }
                .boxed()
                .shared();
                state.pending.insert(
                    key,
                    Pending {
                        id,
                        fetch: fetch.clone(),
                    },
                );
                fetch
            }
        };

        fetch.await
    }

    /// `true` if a fresh entry exists. Never fetches or evicts.
    pub fn has(&self, key: &K) -> bool {
        let state = self.inner.state.lock();
        state
            .entries
            .get(key)
            .is_some_and(|entry| self.inner.is_fresh(entry))
    }

    /// Drop the entry for `key`. Returns `true` if there was one.
    pub fn invalidate(&self, key: &K) -> bool {
        let removed = self.inner.state.lock().entries.remove(key).is_some();
        if removed {
            debug!(cache = self.inner.name, key = ?key, "Cache entry invalidated");
        }
        removed
    }

    /// Drop every entry. Fetches already in flight still complete.
    pub fn clear_cache(&self) {
        let cleared = {
            let mut state = self.inner.state.lock();
            let count = state.entries.len();
            state.entries.clear();
            count
        };
        debug!(cache = self.inner.name, cleared, "Cache cleared");
    }

    /// Evict expired entries now instead of on next access.
    pub fn purge_expired(&self) -> usize {
        let mut state = self.inner.state.lock();
        let before = state.entries.len();
        state.entries.retain(|_, entry| self.inner.is_fresh(entry));
        before - state.entries.len()
    }

    /// Stored entries, including ones that expired but were not evicted yet.
    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }
}

impl<K, V> fmt::Debug for CachedService<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("CachedService")
            .field("name", &self.inner.name)
            .field("ttl", &self.inner.ttl)
            .field("entries", &state.entries.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}
