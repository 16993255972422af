//! Per-session decode environment.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::token::{Token, TokenTable};

/// Decode environment shared by every worker of one session.
///
/// Exposes the profile's string config and the cooperative stream-shutdown
/// flag. A `Context` is callable from any thread.
#[derive(Debug)]
pub struct Context {
    tokens: Arc<TokenTable>,
    config: Arc<HashMap<String, String>>,
    stream_open: AtomicBool,
    closed: AtomicBool,
}

impl Context {
    pub(crate) fn new(tokens: Arc<TokenTable>, config: Arc<HashMap<String, String>>) -> Self {
        Self {
            tokens,
            config,
            stream_open: AtomicBool::new(true),
            closed: AtomicBool::new(false),
        }
    }

    /// Get a config value set on the session profile.
    ///
    /// Absent keys are not an error.
    pub fn get_config(&self, key: &str) -> Option<&str> {
        self.config.get(key).map(String::as_str)
    }

    /// Ask the upstream frame producer to stop.
    ///
    /// Cooperative only: frames already pushed keep decoding, and
    /// [`crate::Session::push_frame`] still accepts frames. Idempotent, and a
    /// no-op once the context has been closed.
    pub fn close_stream(&self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if self.stream_open.swap(false, Ordering::AcqRel) {
            debug!("stream closed by context");
        }
    }

    /// Whether upstream may keep producing frames.
    pub fn is_stream_open(&self) -> bool {
        self.stream_open.load(Ordering::Acquire)
    }

    /// Make the context inert. Config lookups keep working.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Whether [`Context::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Token table shared with the session.
    pub fn tokens(&self) -> &TokenTable {
        &self.tokens
    }

    /// Intern `name` in the session's token table.
    #[inline]
    pub fn token(&self, name: &str) -> Token {
        self.tokens.intern(name)
    }
}
