//! Registry of available dissectors.

use std::fmt;
use std::sync::Arc;

use super::Dissector;

/// Registry of dissectors, looked up by id.
///
/// Registration order is the order in which dissectors are offered layers
/// during dispatch.
#[derive(Clone, Default)]
pub struct DissectorRegistry {
    dissectors: Vec<Arc<dyn Dissector>>,
}

impl DissectorRegistry {
    pub fn new() -> Self {
        Self {
            dissectors: Vec::new(),
        }
    }

    /// Register a dissector. A dissector with the same id is replaced in
    /// place.
    pub fn register<D: Dissector + 'static>(&mut self, dissector: D) {
        let dissector: Arc<dyn Dissector> = Arc::new(dissector);
        match self.position(dissector.id()) {
            Some(pos) => self.dissectors[pos] = dissector,
            None => self.dissectors.push(dissector),
        }
    }

    /// Get a dissector by id.
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Dissector>> {
        self.dissectors.iter().find(|d| d.id() == id)
    }

    /// Position of a dissector in dispatch order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.dissectors.iter().position(|d| d.id() == id)
    }

    /// Get all registered dissector ids.
    pub fn ids(&self) -> Vec<&str> {
        self.dissectors.iter().map(|d| d.id()).collect()
    }

    pub(crate) fn all(&self) -> &[Arc<dyn Dissector>] {
        &self.dissectors
    }

    pub fn len(&self) -> usize {
        self.dissectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dissectors.is_empty()
    }
}

impl fmt::Debug for DissectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DissectorRegistry")
            .field("dissectors", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::dissector::{DissectorWorker, EthernetDissector, Status};
    use crate::error::DissectError;
    use crate::layer::Layer;

    struct Named(&'static str);

    struct Noop;

    impl DissectorWorker for Noop {
        fn dissect(&mut self, _: &Context, _: &[u8], _: &mut Layer) -> Result<Status, DissectError> {
            Ok(Status::Skip)
        }
    }

    impl Dissector for Named {
        fn id(&self) -> &str {
            self.0
        }

        fn new_worker(&self, _ctx: &Context) -> Box<dyn DissectorWorker> {
            Box::new(Noop)
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = DissectorRegistry::new();
        registry.register(EthernetDissector);
        registry.register(Named("ipv4"));

        assert_eq!(registry.len(), 2);
        assert!(registry.get("eth").is_some());
        assert!(registry.get("ipv4").is_some());
        assert!(registry.get("unknown").is_none());
        assert_eq!(registry.ids(), vec!["eth", "ipv4"]);
    }

    #[test]
    fn test_reregister_replaces_in_place() {
        let mut registry = DissectorRegistry::new();
        registry.register(Named("a"));
        registry.register(Named("b"));
        registry.register(Named("a"));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.position("a"), Some(0));
        assert_eq!(registry.position("b"), Some(1));
    }

    #[test]
    fn test_empty_registry() {
        let registry = DissectorRegistry::default();
        assert!(registry.is_empty());
        assert!(format!("{:?}", registry).contains("DissectorRegistry"));
    }
}
