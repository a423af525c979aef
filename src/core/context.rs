//! Layered variable context for a project run
//!
//! Lookups search the layers front to back. Writes always go to the first
//! (top) layer. Subproject inclusion appends a layer at the back, so values a
//! subproject resolved become visible to the parent without shadowing any of
//! the parent's own values.

use serde_json::{Map, Value};

/// Ordered stack of variable maps.
#[derive(Debug, Clone)]
pub struct Context {
    layers: Vec<Map<String, Value>>,
}

impl Context {
    /// Create a context with a single empty top layer
    pub fn new() -> Self {
        Self {
            layers: vec![Map::new()],
        }
    }

    /// Look up a variable, searching the layers in priority order
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.layers.iter().find_map(|layer| layer.get(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Set a variable in the top layer
    pub fn insert<K: Into<String>>(&mut self, key: K, value: Value) {
        self.layers[0].insert(key.into(), value);
    }

    /// Append a lower-priority layer
    pub fn push_layer(&mut self, layer: Map<String, Value>) {
        self.layers.push(layer);
    }

    /// Number of layers, including the top layer
    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// Collapse all layers into one map. Higher-priority layers win.
    pub fn flatten(&self) -> Map<String, Value> {
        let mut merged = Map::new();
        for layer in self.layers.iter().rev() {
            for (key, value) in layer {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
