//! Filter result cache.
//!
//! Filtered queries re-run over the same frames many times (scrolling a view,
//! paging through results). A decoded frame never changes, so the outcome of
//! a registered filter on it is stable until the filter is replaced.
//!
//! Each registered filter owns one cache keyed by frame index. Replacing the
//! filter replaces its cache, which leaves every other filter's cache alone.

mod lru;

pub use lru::LruResultCache;

/// Cache of filter outcomes keyed by frame index.
///
/// Implementations must be thread-safe: several query threads may evaluate
/// the same filter at once.
pub trait ResultCache: Send + Sync {
    /// Get the cached outcome for a frame, if available.
    fn get(&self, index: u32) -> Option<bool>;

    /// Store the outcome for a frame.
    fn put(&self, index: u32, matched: bool);

    /// Drop every cached outcome.
    fn clear(&self);

    /// Get cache statistics (if available).
    fn stats(&self) -> Option<CacheStats> {
        None
    }

    /// Reset statistics counters. Default implementation does nothing.
    fn reset_stats(&self) {}
}

/// No-op cache implementation for when caching is disabled.
///
/// Every lookup misses, so the filter runs on each query.
#[derive(Clone, Debug, Default)]
pub struct NoCache;

impl ResultCache for NoCache {
    fn get(&self, _index: u32) -> Option<bool> {
        None
    }

    fn put(&self, _index: u32, _matched: bool) {}

    fn clear(&self) {}
}

/// Build the cache a filter slot should use for `capacity` entries.
pub fn result_cache(capacity: usize) -> Box<dyn ResultCache> {
    if capacity == 0 {
        Box::new(NoCache)
    } else {
        Box::new(LruResultCache::new(capacity))
    }
}

/// Cache statistics for monitoring.
#[derive(Clone, Debug, Default)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Current number of cached entries.
    pub entries: usize,
    /// Maximum number of entries allowed.
    pub max_entries: usize,
    /// Number of entries evicted due to LRU policy.
    pub evictions: u64,
    /// Peak number of entries ever held (high watermark).
    pub peak_entries: usize,
}

impl CacheStats {
    /// Calculate the hit ratio (hits / total accesses).
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Calculate cache utilization (entries / max_entries).
    pub fn utilization(&self) -> f64 {
        if self.max_entries == 0 {
            0.0
        } else {
            self.entries as f64 / self.max_entries as f64
        }
    }

    /// Format statistics as a human-readable string.
    pub fn format_summary(&self) -> String {
        let hit_pct = self.hit_ratio() * 100.0;
        let miss_pct = 100.0 - hit_pct;
        let util_pct = self.utilization() * 100.0;

        format!(
            "Filter Cache Statistics:\n\
             \x20 Hits:        {:>10} ({:.1}%)\n\
             \x20 Misses:      {:>10} ({:.1}%)\n\
             \x20 Entries:     {:>10} / {} ({:.1}%)\n\
             \x20 Peak:        {:>10}\n\
             \x20 Evictions:   {:>10}",
            self.hits, hit_pct,
            self.misses, miss_pct,
            self.entries, self.max_entries, util_pct,
            self.peak_entries,
            self.evictions,
        )
    }
}
