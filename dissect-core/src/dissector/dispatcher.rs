//! Per-thread dissector dispatch.
//!
//! Each pool thread owns one [`Dispatcher`]. It holds the thread's lazily
//! created [`DissectorWorker`]s and drives them over a frame:
//!
//! 1. the dissector bound to the frame's link type runs on the root layer;
//! 2. every layer of the tree is then offered, depth-first, to every
//!    registered dissector that has not reported [`Status::Done`] for this
//!    frame yet. Children a dissector adds are visited after their parent;
//! 3. the finished tree is sealed: every layer is stamped with the pool
//!    worker id and ranges past the payload end are clamped.
//!
//! The first error stops dispatch for the frame. The partial tree is still
//! sealed and published.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{trace, warn};

use super::{DissectorRegistry, DissectorWorker, Status};
use crate::context::Context;
use crate::error::DissectError;
use crate::frame::Frame;
use crate::layer::{Layer, Range};

/// Maximum layer depth visited during dispatch.
const MAX_DEPTH: usize = 32;

pub(crate) struct Dispatcher {
    worker_id: u8,
    ctx: Arc<Context>,
    registry: DissectorRegistry,
    /// link type -> position of the bound dissector in `registry`
    link_layers: Arc<HashMap<i32, usize>>,
    runners: Vec<Option<Box<dyn DissectorWorker>>>,
}

impl Dispatcher {
    pub(crate) fn new(
        worker_id: u8,
        ctx: Arc<Context>,
        registry: DissectorRegistry,
        link_layers: Arc<HashMap<i32, usize>>,
    ) -> Self {
        let runners = (0..registry.len()).map(|_| None).collect();
        Self {
            worker_id,
            ctx,
            registry,
            link_layers,
            runners,
        }
    }

    /// Build the layer tree of `frame` in place.
    pub(crate) fn process_frame(&mut self, frame: &mut Frame) -> Result<(), DissectError> {
        let link_type = frame.link_type();
        let index = frame.index();
        let len = frame.len() as u32;

        let result = match self.link_layers.get(&link_type).copied() {
            Some(entry) => {
                let (payload, root) = frame.parts_mut();
                let mut done = vec![false; self.runners.len()];
                self.run(entry, payload, root, &mut done)
                    .and_then(|_| self.visit(payload, root, &mut done, 0))
            }
            None => Err(DissectError::NoDissector { link_type }),
        };

        let mut clamped = None;
        self.seal(frame.root_mut(), len, &mut clamped);

        trace!(index, worker = self.worker_id, ok = result.is_ok(), "frame dissected");
        result.and(clamped.map_or(Ok(()), Err))
    }

    /// Offer `layer` to every pending dissector until a full pass completes
    /// none of them, then descend into its children.
    ///
    /// Repeating the pass lets a dissector that skipped the layer see tags
    /// and children added by one registered after it.
    fn visit(
        &mut self,
        payload: &[u8],
        layer: &mut Layer,
        done: &mut [bool],
        depth: usize,
    ) -> Result<(), DissectError> {
        if depth > MAX_DEPTH {
            return Ok(());
        }

        loop {
            let mut progressed = false;
            for position in 0..self.runners.len() {
                if !done[position] && self.run(position, payload, layer, done)? {
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }

        for child in layer.children_mut() {
            self.visit(payload, child, done, depth + 1)?;
        }
        Ok(())
    }

    /// Run one dissector on one layer, creating its worker on first use.
    ///
    /// Returns whether the dissector reported [`Status::Done`]. A panic in
    /// either the worker factory or the worker fails the frame and discards
    /// the worker.
    fn run(
        &mut self,
        position: usize,
        payload: &[u8],
        layer: &mut Layer,
        done: &mut [bool],
    ) -> Result<bool, DissectError> {
        let ctx = &self.ctx;
        let dissector = &self.registry.all()[position];
        let runner = &mut self.runners[position];

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let worker = runner.get_or_insert_with(|| dissector.new_worker(ctx));
            worker.dissect(ctx, payload, layer)
        }));
        match outcome {
            Ok(Ok(Status::Done)) => {
                done[position] = true;
                Ok(true)
            }
            Ok(Ok(Status::Skip)) => Ok(false),
            Ok(Err(e)) => {
                done[position] = true;
                Err(e)
            }
            Err(_) => {
                warn!(dissector = dissector.id(), "dissector panicked; discarding its worker");
                *runner = None;
                Err(DissectError::Panicked {
                    dissector: dissector.id().to_string(),
                })
            }
        }
    }

    /// Stamp provenance and clamp out-of-bounds ranges, keeping the first
    /// violation.
    fn seal(&self, layer: &mut Layer, len: u32, clamped: &mut Option<DissectError>) {
        layer.set_worker(self.worker_id);

        let range = layer.range();
        if !range.fits(len) {
            if clamped.is_none() {
                let name = self
                    .ctx
                    .tokens()
                    .resolve(layer.id())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|_| layer.id().to_string());
                *clamped = Some(DissectError::RangeOutOfBounds {
                    layer: name,
                    start: range.start,
                    end: range.end,
                    len,
                });
            }
            let start = range.start.min(len);
            layer.set_range(Range::new(start, range.end.min(len)));
        }

        for child in layer.children_mut() {
            self.seal(child, len, clamped);
        }
    }
}
