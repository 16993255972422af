//! Thread-local filter worker registry.
//!
//! Every thread keeps the [`FilterWorker`]s it has created in a thread-local
//! list, keyed by the identity of the registered filter. Entries hold a
//! `Weak` to the filter, which pins the allocation, so an address can never
//! be mistaken for a newer filter. Entries whose filter was replaced or
//! removed are swept on the thread's next evaluation; the rest are dropped
//! when the thread exits.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use super::{Filter, FilterWorker};
use crate::frame::Frame;

struct Isolate {
    filter: Weak<dyn Filter>,
    /// `None` while checked out by an evaluation on this thread.
    worker: Option<Box<dyn FilterWorker>>,
}

thread_local! {
    static ISOLATES: RefCell<Vec<Isolate>> = const { RefCell::new(Vec::new()) };
}

/// Run `filter` on `frame` with this thread's worker for it.
///
/// Returns `None` if creating or running the worker panicked. The worker is
/// then dropped and a fresh one is created next time.
pub(super) fn evaluate(filter: &Arc<dyn Filter>, frame: &Frame) -> Option<bool> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut worker = checkout(filter);
        let matched = worker.test(frame);
        (worker, matched)
    }));
    match outcome {
        Ok((worker, matched)) => {
            checkin(filter, worker);
            Some(matched)
        }
        Err(_) => None,
    }
}

/// Take this thread's worker for `filter` out of the registry, creating it
/// on first use.
///
/// The registry is not borrowed while the worker runs, so a filter may
/// itself evaluate other filters.
fn checkout(filter: &Arc<dyn Filter>) -> Box<dyn FilterWorker> {
    let existing = ISOLATES.with(|isolates| {
        let mut isolates = isolates.borrow_mut();
        isolates.retain(|isolate| isolate.filter.strong_count() > 0);
        isolates
            .iter_mut()
            .find(|isolate| is_same(&isolate.filter, filter))
            .and_then(|isolate| isolate.worker.take())
    });

    existing.unwrap_or_else(|| filter.new_worker())
}

fn checkin(filter: &Arc<dyn Filter>, worker: Box<dyn FilterWorker>) {
    ISOLATES.with(|isolates| {
        let mut isolates = isolates.borrow_mut();
        match isolates.iter_mut().find(|isolate| is_same(&isolate.filter, filter)) {
            Some(isolate) => isolate.worker = Some(worker),
            None => isolates.push(Isolate {
                filter: Arc::downgrade(filter),
                worker: Some(worker),
            }),
        }
    });
}

fn is_same(weak: &Weak<dyn Filter>, filter: &Arc<dyn Filter>) -> bool {
    std::ptr::addr_eq(weak.as_ptr(), Arc::as_ptr(filter))
}

/// Number of live workers held by the calling thread.
#[cfg(test)]
pub(super) fn local_workers() -> usize {
    ISOLATES.with(|isolates| {
        isolates
            .borrow()
            .iter()
            .filter(|isolate| isolate.filter.strong_count() > 0 && isolate.worker.is_some())
            .count()
    })
}
