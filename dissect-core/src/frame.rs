//! Captured frames and their decode lifecycle.

use bytes::Bytes;

use crate::layer::{Layer, Range};
use crate::token::Token;

/// Decode lifecycle of a frame in the session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameState {
    /// Waiting in the pool queue.
    Queued = 0,
    /// A pool worker is dissecting it.
    Decoding = 1,
    /// Decoded without error.
    Complete = 2,
    /// Decoded, but the pipeline reported an error. The layer tree may be
    /// partial.
    Failed = 3,
}

impl FrameState {
    /// Convert a stored discriminant back to a state.
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => FrameState::Queued,
            1 => FrameState::Decoding,
            2 => FrameState::Complete,
            _ => FrameState::Failed,
        }
    }

    /// Whether decoding has finished, with or without error.
    pub fn is_terminal(self) -> bool {
        matches!(self, FrameState::Complete | FrameState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FrameState::Queued => "queued",
            FrameState::Decoding => "decoding",
            FrameState::Complete => "complete",
            FrameState::Failed => "failed",
        }
    }
}

/// Name of the root layer id for a link type, e.g. `[link-1]`.
pub fn link_layer_name(link_type: i32) -> String {
    format!("[link-{}]", link_type)
}

/// One captured packet: payload bytes, link type, store index and the root
/// of its layer tree.
#[derive(Debug, Clone)]
pub struct Frame {
    index: u32,
    link_type: i32,
    payload: Bytes,
    root: Layer,
    error: Option<String>,
}

impl Frame {
    /// Build an undecoded frame. The root layer spans the whole payload and
    /// has no tags or children yet.
    pub(crate) fn new(index: u32, link_type: i32, payload: Bytes, root_id: Token) -> Self {
        let root = Layer::with_range(root_id, Range::new(0, payload.len() as u32));
        Self {
            index,
            link_type,
            payload,
            root,
            error: None,
        }
    }

    /// Position in the session store, fixed at push time.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn link_type(&self) -> i32 {
        self.link_type
    }

    /// Raw captured bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Root of the decoded layer tree.
    #[inline]
    pub fn root(&self) -> &Layer {
        &self.root
    }

    /// Decode failure message, if the pipeline reported one.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Mutable root, for the decode step only.
    pub(crate) fn root_mut(&mut self) -> &mut Layer {
        &mut self.root
    }

    /// Split borrow used by the dispatcher: payload bytes plus mutable root.
    pub(crate) fn parts_mut(&mut self) -> (&[u8], &mut Layer) {
        (&self.payload, &mut self.root)
    }

    pub(crate) fn set_error(&mut self, message: String) {
        self.error = Some(message);
    }
}
