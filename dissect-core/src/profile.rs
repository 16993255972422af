//! Session configuration.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::thread;

/// Default number of cached results kept per filter.
pub const DEFAULT_FILTER_CACHE_CAPACITY: usize = 65_536;

/// Builder-style session configuration.
///
/// Mutable until handed to [`crate::Session::new`], which takes it by value,
/// so later edits on a clone never reach a running session.
#[derive(Debug, Clone)]
pub struct SessionProfile {
    concurrency: usize,
    link_layers: HashMap<i32, String>,
    config: HashMap<String, String>,
    filter_cache_capacity: usize,
}

impl SessionProfile {
    /// Create a profile with one worker per available CPU.
    pub fn new() -> Self {
        let concurrency = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self {
            concurrency,
            link_layers: HashMap::new(),
            config: HashMap::new(),
            filter_cache_capacity: DEFAULT_FILTER_CACHE_CAPACITY,
        }
    }

    /// Number of decode worker threads (always at least 1).
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Set the worker count. Zero is raised to 1.
    pub fn set_concurrency(&mut self, concurrency: usize) {
        self.concurrency = concurrency.max(1);
    }

    /// Bind `link_type` to the dissector registered as `dissector_id`.
    /// The last binding for a link type wins.
    pub fn add_link_layer(&mut self, link_type: i32, dissector_id: impl Into<String>) {
        self.link_layers.insert(link_type, dissector_id.into());
    }

    /// Dissector id bound to `link_type`.
    pub fn link_layer(&self, link_type: i32) -> Option<&str> {
        self.link_layers.get(&link_type).map(String::as_str)
    }

    /// All link-type bindings.
    pub fn link_layers(&self) -> impl Iterator<Item = (i32, &str)> {
        self.link_layers.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Set a config value. The last write for a key wins.
    pub fn set_config(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.config.insert(key.into(), value.into());
    }

    pub fn config(&self, key: &str) -> Option<&str> {
        self.config.get(key).map(String::as_str)
    }

    /// Maximum cached results per filter; 0 disables result caching.
    pub fn filter_cache_capacity(&self) -> usize {
        self.filter_cache_capacity
    }

    pub fn set_filter_cache_capacity(&mut self, capacity: usize) {
        self.filter_cache_capacity = capacity;
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.set_concurrency(concurrency);
        self
    }

    pub fn with_link_layer(mut self, link_type: i32, dissector_id: impl Into<String>) -> Self {
        self.add_link_layer(link_type, dissector_id);
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_config(key, value);
        self
    }

    pub fn with_filter_cache_capacity(mut self, capacity: usize) -> Self {
        self.set_filter_cache_capacity(capacity);
        self
    }

    pub(crate) fn config_map(&self) -> &HashMap<String, String> {
        &self.config
    }
}

impl Default for SessionProfile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let profile = SessionProfile::new();
        assert!(profile.concurrency() >= 1);
        assert_eq!(profile.filter_cache_capacity(), DEFAULT_FILTER_CACHE_CAPACITY);
        assert!(profile.link_layer(1).is_none());
        assert!(profile.config("anything").is_none());
    }

    #[test]
    fn test_concurrency_is_at_least_one() {
        let profile = SessionProfile::new().with_concurrency(0);
        assert_eq!(profile.concurrency(), 1);
    }

    #[test]
    fn test_last_link_layer_wins() {
        let mut profile = SessionProfile::new();
        profile.add_link_layer(1, "eth");
        profile.add_link_layer(1, "eth-strict");
        profile.add_link_layer(101, "raw");

        assert_eq!(profile.link_layer(1), Some("eth-strict"));
        assert_eq!(profile.link_layer(101), Some("raw"));
        assert_eq!(profile.link_layers().count(), 2);
    }

    #[test]
    fn test_last_config_wins() {
        let profile = SessionProfile::new()
            .with_config("eth.strict", "false")
            .with_config("eth.strict", "true");
        assert_eq!(profile.config("eth.strict"), Some("true"));
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original = SessionProfile::new().with_config("k", "v1");
        let frozen = original.clone();
        original.set_config("k", "v2");
        assert_eq!(frozen.config("k"), Some("v1"));
    }
}
