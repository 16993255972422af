//! Session: frame store, decode pool and filtered queries.
//!
//! A [`Session`] accepts raw frames, assigns each one the next index, and
//! hands it to a pool of decode threads. Queries read the store in index
//! order and block until the frames they return have finished decoding.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use dissect_core::prelude::*;
//!
//! let mut dissectors = DissectorRegistry::new();
//! dissectors.register(EthernetDissector);
//!
//! let profile = SessionProfile::new()
//!     .with_concurrency(2)
//!     .with_link_layer(LINKTYPE_ETHERNET, "eth");
//!
//! let tokens = Arc::new(TokenTable::new());
//! let (session, completions) = Session::new(Arc::clone(&tokens), profile, dissectors)?;
//!
//! let mut packet = vec![0xff; 12];
//! packet.extend_from_slice(&[0x08, 0x00]);
//! let index = session.push_frame(&packet, LINKTYPE_ETHERNET);
//! assert_eq!(completions.recv().unwrap().index, index);
//!
//! session.set_filter(1, TagFilter::new(tokens.intern("eth.type.ipv4")));
//! let ipv4 = session.filtered_frames(1, 0, session.len())?;
//! assert_eq!(ipv4.len(), 1);
//! # Ok::<(), dissect_core::Error>(())
//! ```

mod pool;
mod store;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use crossbeam_channel::Receiver;
use parking_lot::RwLock;
use tracing::debug;

use crate::cache::{result_cache, CacheStats};
use crate::context::Context;
use crate::dissector::DissectorRegistry;
use crate::error::{Error, Result};
use crate::filter::{Filter, FilterSlot};
use crate::frame::{link_layer_name, Frame, FrameState};
use crate::profile::SessionProfile;
use crate::token::TokenTable;

use pool::{Shared, Task, WorkerPool};
use store::FrameStore;

/// Outcome of decoding one pushed frame.
///
/// Exactly one is sent per [`Session::push_frame`] call. Completions of
/// different frames can arrive in any order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Index of the frame.
    pub index: u32,
    /// Decode failure message, `None` on success.
    pub error: Option<String>,
}

impl Completion {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Top-level frame store with concurrent decoding.
pub struct Session {
    profile: SessionProfile,
    ctx: Arc<Context>,
    store: Arc<FrameStore>,
    filters: RwLock<HashMap<u32, Arc<FilterSlot>>>,
    pool: WorkerPool,
}

impl Session {
    /// Create a session and its decode pool.
    ///
    /// Returns the session together with the receiving end of its completion
    /// channel. Fails if the profile binds a link type to a dissector id
    /// missing from `dissectors`, or if a pool thread cannot be spawned.
    pub fn new(
        tokens: Arc<TokenTable>,
        profile: SessionProfile,
        dissectors: DissectorRegistry,
    ) -> Result<(Self, Receiver<Completion>)> {
        let mut link_layers = HashMap::new();
        for (link_type, id) in profile.link_layers() {
            let position = dissectors
                .position(id)
                .ok_or_else(|| Error::UnknownDissector {
                    link_type,
                    id: id.to_string(),
                })?;
            link_layers.insert(link_type, position);
        }

        let ctx = Arc::new(Context::new(tokens, Arc::new(profile.config_map().clone())));
        let store = Arc::new(FrameStore::new());
        let (completions, receiver) = crossbeam_channel::unbounded();

        let pool = WorkerPool::spawn(
            profile.concurrency(),
            Shared {
                ctx: Arc::clone(&ctx),
                registry: dissectors,
                link_layers: Arc::new(link_layers),
                store: Arc::clone(&store),
                completions,
            },
        )?;

        let session = Session {
            profile,
            ctx,
            store,
            filters: RwLock::new(HashMap::new()),
            pool,
        };
        Ok((session, receiver))
    }

    /// Append a frame and queue it for decoding. Returns its index.
    ///
    /// Never waits for decoding. Frames pushed after
    /// [`Context::close_stream`] are still accepted and decoded.
    pub fn push_frame(&self, data: &[u8], link_type: i32) -> u32 {
        let root_id = self.ctx.token(&link_layer_name(link_type));
        let slot = self.store.append();
        let frame = Frame::new(slot.index(), link_type, Bytes::copy_from_slice(data), root_id);
        let index = slot.index();

        self.pool.submit(Task { frame, slot });
        self.store.commit();
        index
    }

    /// Frames with index in `start..end`, in index order.
    ///
    /// `end` is clipped to [`Session::len`]. Blocks until every returned
    /// frame has finished decoding.
    pub fn frames(&self, start: u32, end: u32) -> Vec<Arc<Frame>> {
        self.store
            .range(start, end)
            .iter()
            .map(|slot| self.store.wait(slot))
            .collect()
    }

    /// Like [`Session::frames`], keeping only frames the filter registered
    /// under `id` accepts.
    ///
    /// The filter runs on the calling thread's own worker for it. Outcomes
    /// are cached per frame until the filter is replaced.
    pub fn filtered_frames(&self, id: u32, start: u32, end: u32) -> Result<Vec<Arc<Frame>>> {
        let slot = self
            .filters
            .read()
            .get(&id)
            .cloned()
            .ok_or(Error::UnknownFilter(id))?;

        Ok(self
            .frames(start, end)
            .into_iter()
            .filter(|frame| slot.matches(frame))
            .collect())
    }

    /// Register `filter` under `id`, replacing any previous one.
    ///
    /// Only the cached outcomes of `id` are invalidated.
    pub fn set_filter<F: Filter + 'static>(&self, id: u32, filter: F) {
        let slot = FilterSlot::new(
            id,
            Arc::new(filter),
            result_cache(self.profile.filter_cache_capacity()),
        );
        let previous = self.filters.write().insert(id, Arc::new(slot));
        if let Some(previous) = previous {
            // Queries still holding the old slot finish against an empty cache
            previous.invalidate();
            debug!(filter = id, "filter replaced");
        }
    }

    /// Unregister the filter under `id`. Returns whether one was registered.
    pub fn remove_filter(&self, id: u32) -> bool {
        let previous = self.filters.write().remove(&id);
        match previous {
            Some(previous) => {
                previous.invalidate();
                true
            }
            None => false,
        }
    }

    /// Zero the hit, miss and eviction counters of the filter under `id`.
    /// Cached outcomes are kept. Returns whether such a filter exists.
    pub fn reset_filter_cache_stats(&self, id: u32) -> bool {
        match self.filters.read().get(&id) {
            Some(slot) => {
                slot.reset_cache_stats();
                true
            }
            None => false,
        }
    }

    /// Registered filter ids, ascending.
    pub fn filter_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.filters.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Result cache statistics of the filter under `id`.
    ///
    /// `None` if no such filter is registered or its caching is disabled.
    pub fn filter_cache_stats(&self, id: u32) -> Option<CacheStats> {
        self.filters.read().get(&id).and_then(|slot| slot.cache_stats())
    }

    /// Decode state of the frame at `index`.
    pub fn frame_state(&self, index: u32) -> Option<FrameState> {
        self.store.slot(index).map(|slot| slot.state())
    }

    /// Number of [`Session::push_frame`] calls that have returned.
    ///
    /// Never counts a push still in progress. With concurrent pushers an
    /// index below `len()` may belong to a call that has not returned yet;
    /// its frame is still returned by queries, which wait for its decode.
    pub fn len(&self) -> u32 {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode environment shared with the dissectors.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn profile(&self) -> &SessionProfile {
        &self.profile
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.ctx.close();
        // Every queued frame is decoded before the threads exit
        self.pool.shutdown();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("frames", &self.len())
            .field("filters", &self.filter_ids())
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dissector::{Dissector, DissectorWorker, EthernetDissector, Status, LINKTYPE_ETHERNET};
    use crate::error::DissectError;
    use crate::filter::{PredicateFilter, TagFilter};
    use crate::layer::Layer;
    use std::time::Duration;

    /// Tags frames whose first byte is 0xFF as "flagged".
    struct Flag;

    struct FlagWorker;

    impl Dissector for Flag {
        fn id(&self) -> &str {
            "flag"
        }

        fn new_worker(&self, _ctx: &Context) -> Box<dyn DissectorWorker> {
            Box::new(FlagWorker)
        }
    }

    impl DissectorWorker for FlagWorker {
        fn dissect(
            &mut self,
            ctx: &Context,
            data: &[u8],
            layer: &mut Layer,
        ) -> std::result::Result<Status, DissectError> {
            if data.first() == Some(&0xff) {
                layer.add_tag(ctx.token("flagged"));
            }
            Ok(Status::Done)
        }
    }

    fn session(concurrency: usize) -> (Session, Receiver<Completion>) {
        let mut dissectors = DissectorRegistry::new();
        dissectors.register(Flag);
        let profile = SessionProfile::new()
            .with_concurrency(concurrency)
            .with_link_layer(0, "flag")
            .with_config("mode", "test");
        Session::new(Arc::new(TokenTable::new()), profile, dissectors).unwrap()
    }

    #[test]
    fn test_push_assigns_indices() {
        let (session, _rx) = session(2);
        assert!(session.is_empty());
        for expected in 0..10 {
            assert_eq!(session.push_frame(&[expected as u8], 0), expected);
        }
        assert_eq!(session.len(), 10);
    }

    #[test]
    fn test_one_completion_per_frame() {
        let (session, rx) = session(3);
        for _ in 0..20 {
            session.push_frame(&[0x00], 0);
        }

        let mut indices: Vec<u32> = (0..20)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .inspect(|c| assert!(c.is_ok()))
            .map(|c| c.index)
            .collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..20).collect::<Vec<_>>());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_frames_waits_for_decode() {
        let (session, _rx) = session(1);
        session.push_frame(&[0xff, 0x01], 0);
        session.push_frame(&[0x00], 0);

        let frames = session.frames(0, 100);
        assert_eq!(frames.len(), 2);
        let flagged = session.context().token("flagged");
        assert!(frames[0].root().has_tag(flagged));
        assert!(!frames[1].root().has_tag(flagged));
        assert_eq!(session.frame_state(0), Some(FrameState::Complete));
        assert_eq!(session.frame_state(2), None);
    }

    #[test]
    fn test_unbound_link_type_fails_frame() {
        let (session, rx) = session(1);
        let index = session.push_frame(&[0x00], 42);

        let completion = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(completion.index, index);
        assert_eq!(
            completion.error.as_deref(),
            Some("no dissector bound to link type 42")
        );

        let frame = &session.frames(index, index + 1)[0];
        assert_eq!(frame.error(), completion.error.as_deref());
        assert_eq!(session.frame_state(index), Some(FrameState::Failed));
    }

    #[test]
    fn test_unknown_dissector_binding() {
        let profile = SessionProfile::new().with_link_layer(1, "eth");
        let err = Session::new(
            Arc::new(TokenTable::new()),
            profile,
            DissectorRegistry::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownDissector { link_type: 1, ref id } if id == "eth"
        ));
    }

    #[test]
    fn test_unknown_filter() {
        let (session, _rx) = session(1);
        assert!(matches!(
            session.filtered_frames(7, 0, 10),
            Err(Error::UnknownFilter(7))
        ));
    }

    #[test]
    fn test_filter_registration() {
        let (session, _rx) = session(1);
        let flagged = session.context().token("flagged");
        session.set_filter(3, TagFilter::new(flagged));
        session.set_filter(1, PredicateFilter::new(|_: &Frame| true));
        assert_eq!(session.filter_ids(), vec![1, 3]);

        assert!(session.remove_filter(3));
        assert!(!session.remove_filter(3));
        assert_eq!(session.filter_ids(), vec![1]);
    }

    #[test]
    fn test_filter_cache_stats() {
        let (session, _rx) = session(2);
        for byte in [0xff, 0x00, 0xff] {
            session.push_frame(&[byte], 0);
        }
        session.set_filter(1, TagFilter::new(session.context().token("flagged")));

        session.filtered_frames(1, 0, 3).unwrap();
        session.filtered_frames(1, 0, 3).unwrap();

        let stats = session.filter_cache_stats(1).unwrap();
        assert_eq!(stats.misses, 3);
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.entries, 3);
        assert!(session.filter_cache_stats(2).is_none());
    }

    #[test]
    fn test_reset_filter_cache_stats() {
        let (session, _rx) = session(1);
        session.push_frame(&[0xff], 0);
        session.set_filter(1, TagFilter::new(session.context().token("flagged")));
        session.filtered_frames(1, 0, 1).unwrap();
        session.filtered_frames(1, 0, 1).unwrap();

        assert!(session.reset_filter_cache_stats(1));
        let stats = session.filter_cache_stats(1).unwrap();
        assert_eq!((stats.hits, stats.misses), (0, 0));
        assert_eq!(stats.entries, 1);
        assert!(!session.reset_filter_cache_stats(2));
    }

    #[test]
    fn test_disabled_cache_has_no_stats() {
        let profile = SessionProfile::new()
            .with_concurrency(1)
            .with_filter_cache_capacity(0);
        let (session, _rx) =
            Session::new(Arc::new(TokenTable::new()), profile, DissectorRegistry::new()).unwrap();
        session.set_filter(1, PredicateFilter::new(|_: &Frame| true));
        assert!(session.filter_cache_stats(1).is_none());
    }

    #[test]
    fn test_context_config_from_profile() {
        let (session, _rx) = session(1);
        assert_eq!(session.context().get_config("mode"), Some("test"));
        assert_eq!(session.context().get_config("missing"), None);
        assert_eq!(session.profile().concurrency(), 1);
    }

    #[test]
    fn test_ethernet_session() {
        let mut dissectors = DissectorRegistry::new();
        dissectors.register(EthernetDissector);
        let profile = SessionProfile::new()
            .with_concurrency(2)
            .with_link_layer(LINKTYPE_ETHERNET, "eth");
        let (session, _rx) =
            Session::new(Arc::new(TokenTable::new()), profile, dissectors).unwrap();

        let mut packet = vec![0xff; 12];
        packet.extend_from_slice(&[0x86, 0xdd]);
        session.push_frame(&packet, LINKTYPE_ETHERNET);

        let frame = &session.frames(0, 1)[0];
        let eth = &frame.root().children()[0];
        assert_eq!(eth.id(), session.context().token("eth"));
        assert!(eth.has_tag(session.context().token("eth.type.ipv6")));
    }

    #[test]
    fn test_drop_drains_queue() {
        let (session, rx) = session(2);
        for _ in 0..50 {
            session.push_frame(&[0xff], 0);
        }
        drop(session);

        // Every frame completed, then the channel disconnected
        assert_eq!(rx.iter().count(), 50);
    }
}
