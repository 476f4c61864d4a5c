//! Concurrent cache of loaded schema classes

use crate::model::SchemaClass;
use dashmap::DashMap;
use std::sync::Arc;

/// Thread-safe registry of immutable classes, keyed by cache key
///
/// Raw classes are stored under their name, resolved classes under
/// `name+resolved`.
#[derive(Debug, Default)]
pub struct ConcurrentSchemaRegistry {
    classes: DashMap<String, Arc<SchemaClass>>,
}

impl ConcurrentSchemaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a class, replacing any previous entry
    pub fn register(&self, key: impl Into<String>, class: Arc<SchemaClass>) {
        self.classes.insert(key.into(), class);
    }

    /// Get a cached class
    pub fn get(&self, key: &str) -> Option<Arc<SchemaClass>> {
        self.classes.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Check if a key is cached
    pub fn contains(&self, key: &str) -> bool {
        self.classes.contains_key(key)
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Drop every cached entry
    pub fn clear(&self) {
        self.classes.clear();
    }
}
