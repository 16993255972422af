//! # dissect-core
//!
//! Session and dissection core of a packet analyzer.
//!
//! Raw frames are pushed into a [`Session`], which numbers them in push order
//! and decodes them concurrently on a pool of worker threads. Decoding builds
//! a tree of [`Layer`]s per frame by chaining pluggable dissectors. Queries
//! return decoded frames by index range, optionally narrowed by a registered
//! [`Filter`].
//!
//! ## Features
//!
//! - **Ordered store**: indices are assigned strictly in push order, whatever
//!   the decode schedule
//! - **Concurrent decode**: a fixed pool of threads, each with its own
//!   dissector instances
//! - **Per-thread filters**: every query thread evaluates through its own
//!   filter worker, so workers hold state without locking
//! - **Result caching**: LRU cache of filter outcomes per filter
//! - **Completion channel**: one [`Completion`] per pushed frame
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use dissect_core::prelude::*;
//!
//! let mut dissectors = DissectorRegistry::new();
//! dissectors.register(EthernetDissector);
//! let profile = SessionProfile::new().with_link_layer(LINKTYPE_ETHERNET, "eth");
//!
//! let (session, _completions) =
//!     Session::new(Arc::new(TokenTable::new()), profile, dissectors)?;
//!
//! let mut packet = vec![0u8; 12];
//! packet.extend_from_slice(&[0x08, 0x06]); // ARP
//! session.push_frame(&packet, LINKTYPE_ETHERNET);
//!
//! for frame in session.frames(0, session.len()) {
//!     for layer in frame.root().walk() {
//!         let name = session.context().tokens().resolve(layer.id())?;
//!         println!("{} {:?}", name, layer.range());
//!     }
//! }
//! # Ok::<(), dissect_core::Error>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                        dissect-core                                 |
//! +---------------------------------------------------------------------+
//! |  token/      - Interned labels                                      |
//! |  context/    - Per-session config and stream shutdown               |
//! |  layer/      - Layer tree and byte ranges                           |
//! |  frame/      - Frames and decode state                              |
//! |  dissector/  - Dissector traits, registry, dispatcher, Ethernet     |
//! |  filter/     - Filter traits, per-thread workers                    |
//! |  cache/      - LRU filter result cache                              |
//! |  session/    - Store, worker pool, queries                          |
//! |  error/      - Error types                                          |
//! +---------------------------------------------------------------------+
//! ```

pub mod cache;
pub mod context;
pub mod dissector;
pub mod error;
pub mod filter;
pub mod frame;
pub mod layer;
pub mod prelude;
pub mod profile;
pub mod session;
pub mod token;

// Re-export commonly used types at crate root for convenience
pub use cache::{CacheStats, LruResultCache, NoCache, ResultCache};
pub use context::Context;
pub use dissector::{Dissector, DissectorRegistry, DissectorWorker, Status};
pub use error::{DissectError, Error, Result, TokenError};
pub use filter::{Filter, FilterWorker, PredicateFilter, TagFilter};
pub use frame::{link_layer_name, Frame, FrameState};
pub use layer::{Layer, Range, Tags, Walk};
pub use profile::{SessionProfile, DEFAULT_FILTER_CACHE_CAPACITY};
pub use session::{Completion, Session};
pub use token::{Token, TokenTable};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
