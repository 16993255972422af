//! Convenient re-exports for common usage.
//!
//! This module provides a curated set of the most commonly used types
//! from dissect-core, allowing you to import them with a single `use` statement.
//!
//! # Example
//!
//! ```rust
//! use dissect_core::prelude::*;
//!
//! let profile = SessionProfile::new().with_link_layer(LINKTYPE_ETHERNET, "eth");
//! let mut dissectors = DissectorRegistry::new();
//! dissectors.register(EthernetDissector);
//! # let _ = (profile, dissectors);
//! ```

// Session types
pub use crate::session::{Completion, Session};
pub use crate::profile::SessionProfile;

// Data model
pub use crate::context::Context;
pub use crate::frame::{Frame, FrameState};
pub use crate::layer::{Layer, Range};
pub use crate::token::{Token, TokenTable};

// Dissector types
pub use crate::dissector::{
    Dissector, DissectorRegistry, DissectorWorker, EthernetDissector, Status, LINKTYPE_ETHERNET,
};

// Filter types
pub use crate::filter::{Filter, FilterWorker, PredicateFilter, TagFilter};

// Error types
pub use crate::error::{DissectError, Error, Result};
