//! LRU caching wrapper around a policy source
//!
//! `PolicyCache` is deliberately not thread-safe: concurrent get/evict races
//! would corrupt LRU recency ordering, so callers serialize access externally
//! (the pipeline holds it behind a `Mutex`). The cache performs no I/O.

use super::{PolicySource, TenantPolicy};
use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;

/// Hit/miss counters for cache observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Hit rate in [0, 1]; 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LRU cache in front of any [`PolicySource`].
///
/// O(1) get/put; the least-recently-used entry is evicted on overflow.
/// Eviction is purely capacity-driven, never business-logic-driven.
pub struct PolicyCache<S: PolicySource> {
    source: S,
    entries: LruCache<String, TenantPolicy>,
    stats: CacheStats,
}

impl<S: PolicySource> PolicyCache<S> {
    /// Wrap `source` with an LRU cache holding at most `maxsize` entries.
    ///
    /// # Panics
    /// Panics if `maxsize` is zero.
    pub fn new(source: S, maxsize: usize) -> Self {
        let cap = NonZeroUsize::new(maxsize).expect("cache maxsize must be non-zero");
        Self {
            source,
            entries: LruCache::new(cap),
            stats: CacheStats::default(),
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `id` is currently cached, without touching recency or stats.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains(id)
    }

    /// Drop all cached entries; stats are preserved.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<S: PolicySource> PolicySource for PolicyCache<S> {
    fn policy(&mut self, id: &str) -> Option<TenantPolicy> {
        if let Some(policy) = self.entries.get(id) {
            self.stats.hits += 1;
            return Some(policy.clone());
        }
        self.stats.misses += 1;
        let policy = self.source.policy(id)?;
        self.entries.put(id.to_string(), policy.clone());
        Some(policy)
    }
}
