//! Keyed compilation cache.
//!
//! Compiled routines are produced at most once per key and shared by every
//! caller afterwards. Entries are added, never removed or replaced.
//!
//! Uses `DashMap` for concurrent access. On a miss the factory runs outside
//! any shard lock, so two threads racing on the same key may both compile;
//! the first value inserted is kept and returned to both, and the loser's
//! work is counted as redundant.

use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rustc_hash::FxBuildHasher;

/// Counters describing how often the cache avoided work.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Factory results that were inserted.
    pub compilations: u64,
    /// Factory results discarded because another thread inserted first.
    pub redundant: u64,
}

pub struct CompilationCache<K, V> {
    entries: DashMap<K, V, FxBuildHasher>,
    hits: AtomicU64,
    compilations: AtomicU64,
    redundant: AtomicU64,
}

impl<K, V> CompilationCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
{
    pub fn new() -> Self {
        CompilationCache {
            entries: DashMap::with_hasher(FxBuildHasher),
            hits: AtomicU64::new(0),
            compilations: AtomicU64::new(0),
            redundant: AtomicU64::new(0),
        }
    }

    /// Return the value for `key`, compiling it with `factory` on a miss.
    pub fn get_or_add(&self, key: K, factory: impl FnOnce(&K) -> V) -> V {
        match self.try_get_or_add(key, |k| Ok::<V, std::convert::Infallible>(factory(k))) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Fallible [`get_or_add`](Self::get_or_add). Errors are returned to
    /// the caller and not cached, so the next lookup compiles again.
    pub fn try_get_or_add<E>(
        &self,
        key: K,
        factory: impl FnOnce(&K) -> Result<V, E>,
    ) -> Result<V, E> {
        // Fast path: already compiled
        if let Some(value) = self.entries.get(&key) {
            self.hits.fetch_add(1, AtomicOrdering::Relaxed);
            return Ok(value.clone());
        }

        let value = factory(&key)?;

        match self.entries.entry(key) {
            Entry::Occupied(existing) => {
                self.redundant.fetch_add(1, AtomicOrdering::Relaxed);
                tracing::debug!(key = ?existing.key(), "concurrent compilation discarded");
                Ok(existing.get().clone())
            }
            Entry::Vacant(slot) => {
                self.compilations.fetch_add(1, AtomicOrdering::Relaxed);
                tracing::debug!(key = ?slot.key(), "routine compiled and cached");
                slot.insert(value.clone());
                Ok(value)
            }
        }
    }

    /// Cached value for `key`, without compiling.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|v| v.clone())
    }

    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(AtomicOrdering::Relaxed),
            compilations: self.compilations.load(AtomicOrdering::Relaxed),
            redundant: self.redundant.load(AtomicOrdering::Relaxed),
        }
    }
}

impl<K, V> Default for CompilationCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for CompilationCache<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilationCache")
            .field("len", &self.entries.len())
            .field("hits", &self.hits.load(AtomicOrdering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
mod tests;
