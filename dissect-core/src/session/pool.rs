//! Decode worker pool.
//!
//! A fixed set of named threads pulls frames off an unbounded MPMC queue.
//! Each thread owns a [`Dispatcher`], so dissector workers are never shared.
//! After decoding, the frame is published to the store and one
//! [`Completion`] is sent.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, SendError, Sender};
use tracing::{debug, trace, warn};

use super::store::{FrameSlot, FrameStore};
use super::Completion;
use crate::context::Context;
use crate::dissector::{Dispatcher, DissectorRegistry};
use crate::error::Result;
use crate::frame::Frame;

/// A frame waiting for decode, plus the store slot it will be published to.
pub(crate) struct Task {
    pub(crate) frame: Frame,
    pub(crate) slot: Arc<FrameSlot>,
}

/// Everything a pool thread needs besides its queue.
#[derive(Clone)]
pub(crate) struct Shared {
    pub(crate) ctx: Arc<Context>,
    pub(crate) registry: DissectorRegistry,
    /// link type -> dissector position in `registry`
    pub(crate) link_layers: Arc<HashMap<i32, usize>>,
    pub(crate) store: Arc<FrameStore>,
    pub(crate) completions: Sender<Completion>,
}

pub(crate) struct WorkerPool {
    sender: Option<Sender<Task>>,
    handles: Vec<JoinHandle<()>>,
    shared: Shared,
}

impl WorkerPool {
    /// Spawn `concurrency` worker threads.
    pub(crate) fn spawn(concurrency: usize, shared: Shared) -> Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let mut pool = WorkerPool {
            sender: Some(sender),
            handles: Vec::with_capacity(concurrency),
            shared,
        };

        for n in 0..concurrency {
            let worker_id = u8::try_from(n).unwrap_or(u8::MAX);
            let receiver = receiver.clone();
            let shared = pool.shared.clone();
            // On error, dropping `pool` joins the threads already started
            let handle = thread::Builder::new()
                .name(format!("dissect-worker-{}", n))
                .spawn(move || run_worker(worker_id, receiver, shared))?;
            pool.handles.push(handle);
        }

        debug!(threads = concurrency, "worker pool started");
        Ok(pool)
    }

    /// Queue a frame for decoding.
    pub(crate) fn submit(&self, task: Task) {
        let task = match &self.sender {
            Some(sender) => match sender.send(task) {
                Ok(()) => return,
                Err(SendError(task)) => task,
            },
            None => task,
        };

        // Only reachable once the pool has shut down; fail the frame so
        // readers never wait on it forever
        let Task { mut frame, slot } = task;
        frame.set_error("worker pool is shut down".to_string());
        finish(&self.shared, &slot, frame);
    }

    /// Close the queue and wait for every queued frame to be decoded.
    pub(crate) fn shutdown(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        for handle in self.handles.drain(..) {
            let name = handle.thread().name().map(str::to_string);
            if handle.join().is_err() {
                debug!(thread = ?name, "worker thread panicked");
            }
        }
        debug!("worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(worker_id: u8, receiver: Receiver<Task>, shared: Shared) {
    let dispatcher = || {
        Dispatcher::new(
            worker_id,
            Arc::clone(&shared.ctx),
            shared.registry.clone(),
            Arc::clone(&shared.link_layers),
        )
    };
    let mut current = dispatcher();
    trace!(worker = worker_id, "worker thread running");

    // Ends once every sender is dropped and the queue is drained
    for Task { mut frame, slot } in receiver.iter() {
        slot.set_decoding();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| current.process_frame(&mut frame)));
        let error = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => {
                // Dissector panics are caught per call; anything reaching
                // here leaves the dispatcher in an unknown state
                warn!(
                    index = frame.index(),
                    worker = worker_id,
                    "dispatch panicked; resetting dispatcher"
                );
                current = dispatcher();
                Some("dispatch panicked".to_string())
            }
        };
        if let Some(error) = error {
            debug!(index = frame.index(), worker = worker_id, %error, "frame decode failed");
            frame.set_error(error);
        }
        finish(&shared, &slot, frame);
    }

    trace!(worker = worker_id, "worker thread exiting");
}

/// Publish a decoded frame and report its completion.
fn finish(shared: &Shared, slot: &FrameSlot, frame: Frame) {
    let completion = Completion {
        index: frame.index(),
        error: frame.error().map(str::to_string),
    };
    shared.store.publish(slot, Arc::new(frame));
    // The receiver may have been dropped; completions are then discarded
    let _ = shared.completions.send(completion);
}
