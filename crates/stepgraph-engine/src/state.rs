use serde_json::Value;

use stepgraph_core::types::{is_internal_key, StateMap, NEXT_OVERRIDE_KEY};

/// Working state of a single run.
///
/// Owned by exactly one run loop; built from a copy of the caller's state
/// so nothing written during the run reaches the caller's map.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    data: StateMap,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a RunState from initial data.
    pub fn from_map(data: StateMap) -> Self {
        Self { data }
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Set a value.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    /// Shallow-merge a step's update; later writes win.
    ///
    /// Returns the merged key names in update order.
    pub fn merge(&mut self, update: StateMap) -> Vec<String> {
        let mut keys = Vec::with_capacity(update.len());
        for (k, v) in update {
            keys.push(k.clone());
            self.data.insert(k, v);
        }
        keys
    }

    /// Remove the next-hop override if it is set to a truthy value.
    ///
    /// A falsy override stays in place; it is dropped with the other
    /// internal keys when the run ends.
    pub fn take_next_override(&mut self) -> Option<Value> {
        if !self.data.get(NEXT_OVERRIDE_KEY).is_some_and(is_truthy) {
            return None;
        }
        self.data.remove(NEXT_OVERRIDE_KEY)
    }

    /// Current key set.
    pub fn keys(&self) -> Vec<&str> {
        self.data.keys().map(String::as_str).collect()
    }

    /// Get the underlying data map.
    pub fn data(&self) -> &StateMap {
        &self.data
    }

    /// Consume the state, dropping every internal key.
    pub fn into_public(self) -> StateMap {
        self.data
            .into_iter()
            .filter(|(k, _)| !is_internal_key(k))
            .collect()
    }
}

/// Truthiness of a JSON value: null, false, zero and empty containers are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
