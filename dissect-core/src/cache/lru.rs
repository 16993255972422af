//! LRU result cache.
//!
//! Entries are evicted in bulk (about 10% of capacity) once the cache is
//! full, oldest access first.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::{CacheStats, ResultCache};

/// LRU filter result cache with configurable size limit.
///
/// Thread-safe implementation using RwLock for the entries
/// and atomics for statistics.
pub struct LruResultCache {
    /// Maximum number of entries to cache
    max_entries: usize,

    /// Cached entries: frame index -> (matched, last_access_order)
    entries: RwLock<HashMap<u32, (bool, u64)>>,

    /// Monotonically increasing access counter for LRU ordering
    access_counter: AtomicU64,

    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    /// Peak entries ever held (high watermark)
    peak_entries: AtomicUsize,
}

impl LruResultCache {
    /// Create a new cache with the specified maximum entries.
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            max_entries,
            entries: RwLock::new(HashMap::with_capacity(max_entries.min(10_000))),
            access_counter: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            peak_entries: AtomicUsize::new(0),
        }
    }

    /// Evict least recently used entries down to `target_size`.
    fn evict_lru(&self, entries: &mut HashMap<u32, (bool, u64)>, target_size: usize) {
        if entries.len() <= target_size {
            return;
        }

        let to_remove = entries.len() - target_size;

        let mut access_orders: Vec<_> = entries
            .iter()
            .map(|(&index, &(_, order))| (index, order))
            .collect();
        access_orders.sort_unstable_by_key(|&(_, order)| order);

        for (index, _) in access_orders.into_iter().take(to_remove) {
            entries.remove(&index);
        }

        self.evictions.fetch_add(to_remove as u64, Ordering::Relaxed);
    }

    /// Update peak entries if current is higher.
    fn update_peak(&self, current: usize) {
        self.peak_entries.fetch_max(current, Ordering::Relaxed);
    }

    /// Get current cache statistics.
    pub fn get_stats(&self) -> CacheStats {
        let entries = self.entries.read();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: entries.len(),
            max_entries: self.max_entries,
            evictions: self.evictions.load(Ordering::Relaxed),
            peak_entries: self.peak_entries.load(Ordering::Relaxed),
        }
    }
}

impl ResultCache for LruResultCache {
    fn get(&self, index: u32) -> Option<bool> {
        let mut entries = self.entries.write();

        if let Some((matched, access_order)) = entries.get_mut(&index) {
            *access_order = self.access_counter.fetch_add(1, Ordering::Relaxed);
            self.hits.fetch_add(1, Ordering::Relaxed);
            Some(*matched)
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    fn put(&self, index: u32, matched: bool) {
        let mut entries = self.entries.write();

        if !entries.contains_key(&index) && entries.len() >= self.max_entries {
            // Full: drop roughly the oldest 10%
            let target = (self.max_entries as f64 * 0.9) as usize;
            self.evict_lru(&mut entries, target.min(self.max_entries - 1));
        }

        let access_order = self.access_counter.fetch_add(1, Ordering::Relaxed);
        entries.insert(index, (matched, access_order));

        self.update_peak(entries.len());
    }

    fn clear(&self) {
        self.entries.write().clear();
    }

    fn stats(&self) -> Option<CacheStats> {
        Some(self.get_stats())
    }

    fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        // peak_entries is a high watermark and is kept
    }
}

impl fmt::Debug for LruResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.get_stats();
        f.debug_struct("LruResultCache")
            .field("max_entries", &self.max_entries)
            .field("entries", &stats.entries)
            .field("hits", &stats.hits)
            .field("misses", &stats.misses)
            .field("hit_ratio", &format!("{:.2}%", stats.hit_ratio() * 100.0))
            .finish()
    }
}
