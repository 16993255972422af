//! Error types for dissect-core.
//!
//! This module provides structured error types for all dissect-core operations:
//!
//! - [`enum@Error`] - Main error enum returned by session-level operations
//! - [`TokenError`] - Errors from the token table
//! - [`DissectError`] - Per-frame decode failures
//!
//! Decode failures never abort a session. They are reported once through the
//! completion channel and kept on the frame (see [`crate::Frame::error`]).

use thiserror::Error;

/// Main error type for dissect-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Token table lookup failed
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Query referenced a filter id that was never registered
    #[error("Unknown filter id: {0}")]
    UnknownFilter(u32),

    /// Profile binds a link type to a dissector the registry does not hold
    #[error("Link type {link_type} is bound to unknown dissector '{id}'")]
    UnknownDissector { link_type: i32, id: String },

    /// I/O error (e.g. a pool thread could not be spawned)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to interned tokens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Id was never issued by this table
    #[error("unknown token id {0}")]
    UnknownToken(u32),
}

/// Errors raised while decoding a single frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DissectError {
    /// No dissector is bound to the frame's link type
    #[error("no dissector bound to link type {link_type}")]
    NoDissector { link_type: i32 },

    /// Frame bytes did not match what the dissector expects
    #[error("{dissector}: malformed data: {reason}")]
    Malformed { dissector: String, reason: String },

    /// A layer claimed bytes past the end of the payload
    #[error("layer '{layer}' range {start}..{end} exceeds payload length {len}")]
    RangeOutOfBounds {
        layer: String,
        start: u32,
        end: u32,
        len: u32,
    },

    /// The dissector panicked; its worker instance was discarded
    #[error("{dissector}: dissector panicked")]
    Panicked { dissector: String },

    /// Free-form failure reported by a dissector
    #[error("{0}")]
    Other(String),
}

impl DissectError {
    /// Shorthand for [`DissectError::Malformed`].
    pub fn malformed(dissector: impl Into<String>, reason: impl Into<String>) -> Self {
        DissectError::Malformed {
            dissector: dissector.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnknownFilter(7);
        assert_eq!(err.to_string(), "Unknown filter id: 7");

        let err = Error::UnknownDissector {
            link_type: 1,
            id: "eth".to_string(),
        };
        assert!(err.to_string().contains("'eth'"));
    }

    #[test]
    fn test_token_error_converts() {
        let err: Error = TokenError::UnknownToken(42).into();
        assert!(matches!(err, Error::Token(TokenError::UnknownToken(42))));
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn test_dissect_error_messages() {
        let err = DissectError::malformed("eth", "truncated header");
        assert_eq!(err.to_string(), "eth: malformed data: truncated header");

        let err = DissectError::RangeOutOfBounds {
            layer: "ipv4".to_string(),
            start: 14,
            end: 80,
            len: 60,
        };
        assert_eq!(
            err.to_string(),
            "layer 'ipv4' range 14..80 exceeds payload length 60"
        );
    }
}
