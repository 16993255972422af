//! Pluggable dissector framework.
//!
//! This module provides:
//! - [`Dissector`] trait for decoder definitions
//! - [`DissectorWorker`] trait for the per-thread decoder instances
//! - [`DissectorRegistry`] for managing registered dissectors
//! - [`EthernetDissector`], a reference link-layer dissector
//!
//! Protocol logic lives outside this crate. A dissector only has to turn a
//! layer of a frame into tags and child layers; the session takes care of
//! scheduling, dispatch and publication.
//!
//! ## Example
//!
//! ```rust
//! use dissect_core::dissector::{Dissector, DissectorWorker, Status};
//! use dissect_core::{Context, DissectError, Layer};
//!
//! /// Tags frames whose first byte is 0xFF.
//! struct FlagDissector;
//!
//! struct FlagWorker;
//!
//! impl Dissector for FlagDissector {
//!     fn id(&self) -> &str {
//!         "flag"
//!     }
//!
//!     fn new_worker(&self, _ctx: &Context) -> Box<dyn DissectorWorker> {
//!         Box::new(FlagWorker)
//!     }
//! }
//!
//! impl DissectorWorker for FlagWorker {
//!     fn dissect(
//!         &mut self,
//!         ctx: &Context,
//!         data: &[u8],
//!         layer: &mut Layer,
//!     ) -> Result<Status, DissectError> {
//!         if data.first() == Some(&0xff) {
//!             layer.add_tag(ctx.token("flagged"));
//!         }
//!         Ok(Status::Done)
//!     }
//! }
//! ```

mod dispatcher;
mod ethernet;
mod registry;

pub(crate) use dispatcher::Dispatcher;
pub use ethernet::{ethertype, EthernetDissector, LINKTYPE_ETHERNET};
pub use registry::DissectorRegistry;

use crate::context::Context;
use crate::error::DissectError;
use crate::layer::Layer;

/// Outcome of offering a layer to a dissector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The dissector handled the layer and is finished with this frame.
    Done,
    /// Not applicable to this layer; offer the next one.
    Skip,
}

/// Decoder definition, shared by every pool thread.
pub trait Dissector: Send + Sync {
    /// Unique identifier, referenced by [`crate::SessionProfile::add_link_layer`].
    fn id(&self) -> &str;

    /// Create the decoder instance one pool thread will use.
    ///
    /// Called lazily, at most once per pool thread.
    fn new_worker(&self, ctx: &Context) -> Box<dyn DissectorWorker>;
}

/// Per-thread decoder instance. Never shared across threads.
pub trait DissectorWorker {
    /// Dissect `layer`.
    ///
    /// `data` is the whole frame payload; the layer's range says which part
    /// of it the layer covers. Children added here are offered to the other
    /// registered dissectors afterwards.
    fn dissect(
        &mut self,
        ctx: &Context,
        data: &[u8],
        layer: &mut Layer,
    ) -> Result<Status, DissectError>;
}
