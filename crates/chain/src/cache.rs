//! Cache of linked contract factories.
//!
//! A factory is keyed by the contract name and the static overrides it was
//! linked with. Registrar changes do not invalidate entries: once a factory
//! has been linked it keeps the library addresses it was built with.

use crate::ContractFactory;
use deplink_primitives::{LinkOverrides, LinkValue};
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

/// Default number of factories kept per chain.
pub const DEFAULT_FACTORY_CACHE_SIZE: usize = 128;

/// Identity of one linked factory: the contract name plus its overrides in
/// name order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FactoryKey {
    name: String,
    overrides: Vec<(String, LinkValue)>,
}

impl FactoryKey {
    /// Key for `name` linked with `overrides`.
    pub fn new(name: &str, overrides: &LinkOverrides) -> Self {
        Self {
            name: name.to_string(),
            overrides: overrides
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }

    /// Contract name of the key.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Thread-safe factory cache using LRU eviction.
#[derive(Debug)]
pub struct FactoryCache {
    cache: RwLock<LruCache>,
    /// Maximum number of entries before eviction
    max_entries: usize,
}

/// Simple LRU cache implementation
#[derive(Debug, Default)]
struct LruCache {
    /// Map from key to (factory, access_order)
    entries: HashMap<FactoryKey, (Arc<ContractFactory>, u64)>,
    /// Counter for tracking access order
    access_counter: u64,
}

impl LruCache {
    fn get(&mut self, key: &FactoryKey) -> Option<Arc<ContractFactory>> {
        let (factory, order) = self.entries.get_mut(key)?;
        self.access_counter += 1;
        *order = self.access_counter;
        Some(Arc::clone(factory))
    }

    fn insert(&mut self, key: FactoryKey, value: Arc<ContractFactory>, max_entries: usize) {
        if !self.entries.contains_key(&key) && self.entries.len() >= max_entries {
            self.evict_oldest((max_entries / 2).max(1));
        }

        self.access_counter += 1;
        self.entries.insert(key, (value, self.access_counter));
    }

    fn evict_oldest(&mut self, count: usize) {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(key, (_, order))| (key.clone(), *order))
            .collect();
        entries.sort_by_key(|(_, order)| *order);

        for (key, _) in entries.into_iter().take(count) {
            self.entries.remove(&key);
        }
    }
}

impl FactoryCache {
    /// Creates a cache holding at most `max_entries` factories.
    ///
    /// # Panics
    /// Panics if `max_entries` is 0.
    pub fn new(max_entries: usize) -> Self {
        assert!(max_entries > 0, "max_entries must be greater than 0");
        Self {
            cache: RwLock::new(LruCache::default()),
            max_entries,
        }
    }

    /// Cached factory for `key`, refreshing its recency.
    pub fn get(&self, key: &FactoryKey) -> Option<Arc<ContractFactory>> {
        self.cache.write().expect("cache lock poisoned").get(key)
    }

    /// Stores a factory, evicting the least recently used half when full.
    pub fn insert(&self, key: FactoryKey, factory: Arc<ContractFactory>) {
        let mut cache = self.cache.write().expect("cache lock poisoned");
        cache.insert(key, factory, self.max_entries);
    }

    /// Returns true if `key` is cached, without touching its recency.
    pub fn contains(&self, key: &FactoryKey) -> bool {
        self.cache
            .read()
            .expect("cache lock poisoned")
            .entries
            .contains_key(key)
    }

    /// Current number of cached factories.
    pub fn len(&self) -> usize {
        self.cache.read().expect("cache lock poisoned").entries.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of cached factories.
    pub const fn capacity(&self) -> usize {
        self.max_entries
    }

    /// Drops every cached factory.
    pub fn clear(&self) {
        let mut cache = self.cache.write().expect("cache lock poisoned");
        cache.entries.clear();
        cache.access_counter = 0;
    }
}

impl Default for FactoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_FACTORY_CACHE_SIZE)
    }
}
