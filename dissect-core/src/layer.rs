//! Layer tree data model.
//!
//! A [`Layer`] is one dissected region of a frame: a byte [`Range`] into the
//! frame payload, a set of tag [`Token`]s and an ordered list of child layers.
//! Children are owned by value; [`Layer::add_child`] moves the child in, so a
//! layer can never be reachable through two owners.
//!
//! Layers are mutable only while they are being built by the decode step.
//! Once a frame is published to the session store it is only reachable as
//! `Arc<Frame>`, which hands out `&Layer` and nothing else.

use std::iter::FusedIterator;

use smallvec::SmallVec;

use crate::token::Token;

/// Byte range into a frame payload, `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Range {
    pub start: u32,
    pub end: u32,
}

impl Range {
    /// Create a range. `end` is raised to `start` if it is smaller.
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Number of bytes covered.
    #[inline]
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `offset` falls inside the range.
    #[inline]
    pub fn contains(&self, offset: u32) -> bool {
        offset >= self.start && offset < self.end
    }

    /// Whether the range fits in a payload of `len` bytes.
    #[inline]
    pub fn fits(&self, len: u32) -> bool {
        self.start <= self.end && self.end <= len
    }
}

impl From<std::ops::Range<u32>> for Range {
    fn from(r: std::ops::Range<u32>) -> Self {
        Range::new(r.start, r.end)
    }
}

/// One decoded protocol region of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    id: Token,
    range: Range,
    worker: u8,
    // Most layers carry 1-3 tags
    tags: SmallVec<[Token; 4]>,
    children: Vec<Layer>,
}

impl Layer {
    /// Create an empty layer with the given id.
    pub fn new(id: Token) -> Self {
        Self {
            id,
            range: Range::default(),
            worker: 0,
            tags: SmallVec::new(),
            children: Vec::new(),
        }
    }

    /// Create a layer covering `range`.
    pub fn with_range(id: Token, range: impl Into<Range>) -> Self {
        let mut layer = Self::new(id);
        layer.range = range.into();
        layer
    }

    /// Layer id (protocol name token).
    #[inline]
    pub fn id(&self) -> Token {
        self.id
    }

    #[inline]
    pub fn range(&self) -> Range {
        self.range
    }

    pub fn set_range(&mut self, range: impl Into<Range>) {
        self.range = range.into();
    }

    /// Pool worker that produced this layer. Diagnostic only.
    #[inline]
    pub fn worker(&self) -> u8 {
        self.worker
    }

    pub fn set_worker(&mut self, worker: u8) {
        self.worker = worker;
    }

    /// Add a tag. Duplicate tags are ignored.
    pub fn add_tag(&mut self, tag: Token) {
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    pub fn has_tag(&self, tag: Token) -> bool {
        self.tags.contains(&tag)
    }

    /// One-shot iterator over this layer's tags, in insertion order.
    pub fn tags(&self) -> Tags<'_> {
        Tags {
            inner: self.tags.iter(),
        }
    }

    /// Move `child` to the end of this layer's child list.
    pub fn add_child(&mut self, child: Layer) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[Layer] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut [Layer] {
        &mut self.children
    }

    /// Bytes of `payload` this layer covers, if the range is in bounds.
    pub fn data<'a>(&self, payload: &'a [u8]) -> Option<&'a [u8]> {
        payload.get(self.range.start as usize..self.range.end as usize)
    }

    /// Depth-first, pre-order iterator over this layer and its descendants.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    /// Whether this layer or any descendant carries `tag`.
    pub fn tree_has_tag(&self, tag: Token) -> bool {
        self.walk().any(|layer| layer.has_tag(tag))
    }
}

/// Lazy, finite, single-use sequence of tag tokens.
///
/// Not `Clone`: once consumed, call [`Layer::tags`] again for a new one.
#[derive(Debug)]
pub struct Tags<'a> {
    inner: std::slice::Iter<'a, Token>,
}

impl Iterator for Tags<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.inner.next().copied()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Tags<'_> {}
impl FusedIterator for Tags<'_> {}

/// Pre-order traversal produced by [`Layer::walk`].
#[derive(Debug)]
pub struct Walk<'a> {
    stack: Vec<&'a Layer>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Layer;

    fn next(&mut self) -> Option<&'a Layer> {
        let layer = self.stack.pop()?;
        // Push in reverse so the first child is visited next
        self.stack.extend(layer.children.iter().rev());
        Some(layer)
    }
}

impl FusedIterator for Walk<'_> {}
