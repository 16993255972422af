//! Frame filters.
//!
//! A [`Filter`] is a compiled predicate registered on a session under a
//! numeric id. It is never evaluated directly: each thread that runs a
//! filtered query asks the filter for its own [`FilterWorker`] and keeps it
//! for as long as the filter stays registered. Workers are therefore free to
//! hold mutable scratch state without any locking.
//!
//! This crate does not define a filter expression language. [`TagFilter`] and
//! [`PredicateFilter`] cover the common cases; anything else implements the
//! two traits.

mod isolate;

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::cache::{CacheStats, ResultCache};
use crate::frame::Frame;
use crate::token::Token;

/// Predicate definition shared by every query thread.
pub trait Filter: Send + Sync {
    /// Create the evaluator one thread will use.
    ///
    /// Called lazily, once per thread that evaluates this filter.
    fn new_worker(&self) -> Box<dyn FilterWorker>;
}

/// Per-thread predicate evaluator.
///
/// A worker is only ever called from the thread that created it. Dropping
/// it releases whatever it holds; that happens when the thread exits or the
/// filter is replaced.
pub trait FilterWorker {
    /// Whether `frame` matches. `frame` has finished decoding.
    fn test(&mut self, frame: &Frame) -> bool;
}

/// Matches frames whose layer tree carries a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagFilter {
    tag: Token,
}

impl TagFilter {
    pub fn new(tag: Token) -> Self {
        Self { tag }
    }

    pub fn tag(&self) -> Token {
        self.tag
    }
}

impl Filter for TagFilter {
    fn new_worker(&self) -> Box<dyn FilterWorker> {
        Box::new(*self)
    }
}

impl FilterWorker for TagFilter {
    fn test(&mut self, frame: &Frame) -> bool {
        frame.root().tree_has_tag(self.tag)
    }
}

/// Filter backed by a closure.
///
/// ```rust
/// use dissect_core::filter::PredicateFilter;
/// use dissect_core::Frame;
///
/// // Frames longer than 60 bytes
/// let long = PredicateFilter::new(|frame: &Frame| frame.len() > 60);
/// # let _ = long;
/// ```
pub struct PredicateFilter<F> {
    predicate: Arc<F>,
}

impl<F> PredicateFilter<F>
where
    F: Fn(&Frame) -> bool + Send + Sync + 'static,
{
    pub fn new(predicate: F) -> Self {
        Self {
            predicate: Arc::new(predicate),
        }
    }
}

impl<F> Filter for PredicateFilter<F>
where
    F: Fn(&Frame) -> bool + Send + Sync + 'static,
{
    fn new_worker(&self) -> Box<dyn FilterWorker> {
        Box::new(PredicateWorker {
            predicate: Arc::clone(&self.predicate),
        })
    }
}

impl<F> fmt::Debug for PredicateFilter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateFilter").finish_non_exhaustive()
    }
}

struct PredicateWorker<F> {
    predicate: Arc<F>,
}

impl<F> FilterWorker for PredicateWorker<F>
where
    F: Fn(&Frame) -> bool,
{
    fn test(&mut self, frame: &Frame) -> bool {
        (self.predicate)(frame)
    }
}

/// A filter as registered on a session: the definition plus its result
/// cache.
///
/// Replacing a filter swaps the whole slot, so its cache and every thread's
/// worker for it go away together.
pub(crate) struct FilterSlot {
    id: u32,
    filter: Arc<dyn Filter>,
    cache: Box<dyn ResultCache>,
}

impl FilterSlot {
    pub(crate) fn new(id: u32, filter: Arc<dyn Filter>, cache: Box<dyn ResultCache>) -> Self {
        Self { id, filter, cache }
    }

    /// Evaluate the filter on a decoded frame, consulting the cache first.
    ///
    /// A panicking worker excludes the frame, is not cached, and is replaced
    /// on the next evaluation.
    pub(crate) fn matches(&self, frame: &Frame) -> bool {
        let index = frame.index();
        if let Some(matched) = self.cache.get(index) {
            return matched;
        }

        match isolate::evaluate(&self.filter, frame) {
            Some(matched) => {
                self.cache.put(index, matched);
                matched
            }
            None => {
                warn!(filter = self.id, index, "filter panicked; frame excluded");
                false
            }
        }
    }

    pub(crate) fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.stats()
    }

    pub(crate) fn reset_cache_stats(&self) {
        self.cache.reset_stats();
    }

    /// Drop every cached outcome once the slot is unregistered.
    pub(crate) fn invalidate(&self) {
        self.cache.clear();
    }
}

impl fmt::Debug for FilterSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterSlot")
            .field("id", &self.id)
            .field("cache", &self.cache.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{result_cache, NoCache};
    use crate::layer::Layer;
    use crate::token::TokenTable;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn frame(tokens: &TokenTable, index: u32, data: &'static [u8]) -> Frame {
        Frame::new(index, 1, Bytes::from_static(data), tokens.intern("[link-1]"))
    }

    #[test]
    fn test_tag_filter_searches_subtree() {
        let tokens = TokenTable::new();
        let flagged = tokens.intern("flagged");

        let mut tagged = frame(&tokens, 0, &[0xff]);
        let mut child = Layer::new(tokens.intern("eth"));
        child.add_tag(flagged);
        tagged.root_mut().add_child(child);
        let plain = frame(&tokens, 1, &[0x00]);

        let mut worker = TagFilter::new(flagged).new_worker();
        assert!(worker.test(&tagged));
        assert!(!worker.test(&plain));
    }

    #[test]
    fn test_predicate_filter() {
        let tokens = TokenTable::new();
        let filter = PredicateFilter::new(|f: &Frame| f.payload().first() == Some(&0xff));
        let mut worker = filter.new_worker();

        assert!(worker.test(&frame(&tokens, 0, &[0xff, 0x01])));
        assert!(!worker.test(&frame(&tokens, 1, &[0x01])));
    }

    #[test]
    fn test_slot_caches_outcome() {
        let tokens = TokenTable::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let filter = PredicateFilter::new(move |_: &Frame| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });
        let slot = FilterSlot::new(1, Arc::new(filter), result_cache(16));

        let f = frame(&tokens, 5, &[0x00]);
        assert!(slot.matches(&f));
        assert!(slot.matches(&f));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = slot.cache_stats().unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_slot_without_cache_reevaluates() {
        let tokens = TokenTable::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let filter = PredicateFilter::new(move |_: &Frame| {
            counter.fetch_add(1, Ordering::SeqCst);
            false
        });
        let slot = FilterSlot::new(1, Arc::new(filter), Box::new(NoCache));

        let f = frame(&tokens, 0, &[0x00]);
        assert!(!slot.matches(&f));
        assert!(!slot.matches(&f));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(slot.cache_stats().is_none());
    }

    #[test]
    fn test_panicking_filter_excludes_frame() {
        let tokens = TokenTable::new();
        let filter = PredicateFilter::new(|f: &Frame| {
            if f.index() == 1 {
                panic!("bad frame");
            }
            true
        });
        let slot = FilterSlot::new(9, Arc::new(filter), result_cache(16));

        assert!(slot.matches(&frame(&tokens, 0, &[0x00])));
        assert!(!slot.matches(&frame(&tokens, 1, &[0x00])));
        assert!(slot.matches(&frame(&tokens, 2, &[0x00])));
        // The panicking frame was not cached
        assert_eq!(slot.cache_stats().unwrap().entries, 2);
    }

    #[test]
    fn test_invalidate_clears_cache() {
        let tokens = TokenTable::new();
        let slot = FilterSlot::new(2, Arc::new(TagFilter::new(Token::NULL)), result_cache(16));
        slot.matches(&frame(&tokens, 0, &[0x00]));
        slot.matches(&frame(&tokens, 1, &[0x00]));
        assert_eq!(slot.cache_stats().unwrap().entries, 2);

        slot.invalidate();
        assert_eq!(slot.cache_stats().unwrap().entries, 0);
    }
}
