//! Bounded LRU caches of decoded assets and the failure memo
//!
//! Each cache keeps its entries and its in-flight set under one mutex. The
//! lock is never held while an asset is decoded or fetched: a cold lookup
//! marks its key in flight, releases the lock, resolves, then takes the lock
//! again to insert. Concurrent lookups of a key that is in flight wait on a
//! condition variable and re-probe once woken, so each key is resolved by at
//! most one caller at a time.
//!
//! Lock order is cache state, then failure memo. The memo never takes the
//! cache lock.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use lru::LruCache;

use crate::error::IconError;
use crate::models::CacheEntry;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Identifiers whose resolution failed. Entries are never removed.
#[derive(Debug, Default)]
pub struct FailureMemo {
    failed: Mutex<HashSet<String>>,
}

impl FailureMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.failed).contains(key)
    }

    /// Record a failure. Returns false if the key was already recorded.
    pub fn insert(&self, key: &str) -> bool {
        lock(&self.failed).insert(key.to_string())
    }

    pub fn len(&self) -> usize {
        lock(&self.failed).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.failed).is_empty()
    }
}

/// Point-in-time counters for one cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub len: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct CacheState<T> {
    entries: LruCache<String, Arc<T>>,
    in_flight: HashSet<String>,
}

/// A bounded, recency-ordered cache of shared asset handles.
pub struct AssetCache<T> {
    state: Mutex<CacheState<T>>,
    resolved: Condvar,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Clears an in-flight mark and wakes waiters, also when the resolver panics.
struct InFlight<'a, T> {
    cache: &'a AssetCache<T>,
    key: &'a str,
}

impl<T> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        lock(&self.cache.state).in_flight.remove(self.key);
        self.cache.resolved.notify_all();
    }
}

impl<T: CacheEntry> AssetCache<T> {
    /// A cache holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                in_flight: HashSet::new(),
            }),
            resolved: Condvar::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Return the cached entry for `key`, resolving it on a miss.
    ///
    /// A hit refreshes the entry's access time and moves it to the
    /// most-recently-used position. A key in `memo` returns `None` without
    /// calling `resolve`. When `resolve` fails the key is added to `memo`,
    /// the cause is logged and `None` is returned.
    pub fn get_or_resolve<F>(&self, key: &str, memo: &FailureMemo, now_ms: u64, resolve: F) -> Option<Arc<T>>
    where
        F: FnOnce() -> Result<T, IconError>,
    {
        let mut state = lock(&self.state);
        loop {
            if let Some(entry) = state.entries.get(key) {
                entry.touch(now_ms);
                self.hits.fetch_add(1, Ordering::Relaxed);
                log::debug!("cache hit: {}", key);
                return Some(Arc::clone(entry));
            }
            if memo.contains(key) {
                return None;
            }
            if !state.in_flight.contains(key) {
                break;
            }
            state = self.resolved.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        state.in_flight.insert(key.to_string());
        self.misses.fetch_add(1, Ordering::Relaxed);
        drop(state);

        let guard = InFlight { cache: self, key };
        match resolve() {
            Ok(value) => {
                let entry = Arc::new(value);
                let evicted = lock(&self.state).entries.push(key.to_string(), Arc::clone(&entry));
                if let Some((old, _)) = evicted {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                    log::debug!("evicted {} for {}", old, key);
                }
                drop(guard);
                Some(entry)
            }
            Err(e) => {
                memo.insert(key);
                drop(guard);
                log::warn!("could not resolve '{}': {}", key, e);
                None
            }
        }
    }

    /// Look up without resolving or touching recency.
    pub fn peek(&self, key: &str) -> Option<Arc<T>> {
        lock(&self.state).entries.peek(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.state).entries.contains(key)
    }

    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached keys, most recently used first.
    pub fn keys(&self) -> Vec<String> {
        lock(&self.state).entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn stats(&self) -> CacheStats {
        let state = lock(&self.state);
        CacheStats {
            len: state.entries.len(),
            capacity: state.entries.cap().get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
