//! Deduplicating fetch cache.
//!
//! Every key is fetched at most once for the lifetime of the cache. Callers
//! register an optional waiter with [`ResourceCache::get`]; when the host
//! reports the fetch result through [`ResourceCache::complete`], the waiters
//! are handed back in registration order so the caller can dispatch them.
//! Entries are never evicted.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use tracing::debug;

/// A failed fetch. Cheap to clone so every waiter gets the same error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError(Arc<str>);

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(Arc::from(message.into()))
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for FetchError {}

/// Answer to a cache query.
#[derive(Debug)]
pub enum Lookup<V> {
    /// The value is cached; answered in the same call.
    Ready(Arc<V>),
    /// The fetch failed earlier; it is not retried.
    Failed(FetchError),
    /// A fetch is in flight (possibly issued by this very call).
    Pending,
}

impl<V> Lookup<V> {
    pub fn ready(self) -> Option<Arc<V>> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }
}

enum Entry<V, W> {
    Pending(Vec<W>),
    Ready(Arc<V>),
    Failed(FetchError),
}

/// Cache of asynchronously fetched values keyed by `K`, with waiters `W`.
pub struct ResourceCache<K, V, W> {
    entries: HashMap<K, Entry<V, W>>,
    fetches_issued: usize,
}

impl<K, V, W> ResourceCache<K, V, W>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            fetches_issued: 0,
        }
    }

    /// Look up `key`, registering `waiter` if the value is not available yet.
    ///
    /// On the first request for a key, `issue` is called exactly once to start
    /// the underlying fetch. Later requests for a pending key only queue their
    /// waiter. A `None` waiter is a pure prefetch.
    pub fn get(&mut self, key: &K, waiter: Option<W>, issue: impl FnOnce(&K)) -> Lookup<V> {
        match self.entries.get_mut(key) {
            Some(Entry::Ready(value)) => Lookup::Ready(Arc::clone(value)),
            Some(Entry::Failed(err)) => Lookup::Failed(err.clone()),
            Some(Entry::Pending(waiters)) => {
                waiters.extend(waiter);
                Lookup::Pending
            }
            None => {
                self.entries
                    .insert(key.clone(), Entry::Pending(waiter.into_iter().collect()));
                self.fetches_issued += 1;
                issue(key);
                Lookup::Pending
            }
        }
    }

    /// Current state of `key` without registering anything. `None` if the key
    /// was never requested.
    pub fn peek<Q>(&self, key: &Q) -> Option<Lookup<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).map(|entry| match entry {
            Entry::Ready(value) => Lookup::Ready(Arc::clone(value)),
            Entry::Failed(err) => Lookup::Failed(err.clone()),
            Entry::Pending(_) => Lookup::Pending,
        })
    }

    /// Record the outcome of the fetch for `key` and return its waiters in
    /// registration order.
    ///
    /// Completions for keys that were never requested, or that already
    /// settled, are ignored.
    pub fn complete<Q>(&mut self, key: &Q, result: Result<V, FetchError>) -> Vec<W>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let Some(entry) = self.entries.get_mut(key) else {
            debug!("ignoring completion for a key that was never requested");
            return Vec::new();
        };
        if !matches!(entry, Entry::Pending(_)) {
            debug!("ignoring duplicate completion");
            return Vec::new();
        }
        let settled = match result {
            Ok(value) => Entry::Ready(Arc::new(value)),
            Err(err) => Entry::Failed(err),
        };
        match std::mem::replace(entry, settled) {
            Entry::Pending(waiters) => waiters,
            _ => Vec::new(),
        }
    }

    /// Number of fetches started since creation.
    pub fn fetches_issued(&self) -> usize {
        self.fetches_issued
    }

    /// Number of keys whose fetch has not completed yet.
    pub fn pending_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| matches!(entry, Entry::Pending(_)))
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V, W> Default for ResourceCache<K, V, W>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
