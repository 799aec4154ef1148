use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use stepgraph_core::traits::{StepFn, StepOutput};
use stepgraph_core::types::StateMap;
use tracing::debug;

static GLOBAL: OnceLock<Arc<ToolRegistry>> = OnceLock::new();

/// Registry of named tools usable by any graph.
///
/// Safe to share between concurrently executing runs. Registering a name
/// twice replaces the earlier tool.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn StepFn>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry, created on first use.
    pub fn global() -> Arc<ToolRegistry> {
        GLOBAL.get_or_init(|| Arc::new(ToolRegistry::new())).clone()
    }

    /// Register a closure as a tool.
    pub fn register<F>(&self, name: impl Into<String>, tool: F)
    where
        F: Fn(&StateMap) -> StepOutput + Send + Sync + 'static,
    {
        self.register_step(name, Arc::new(tool));
    }

    /// Register an already shared step as a tool.
    pub fn register_step(&self, name: impl Into<String>, tool: Arc<dyn StepFn>) {
        let name = name.into();
        debug!(tool = %name, "Registering tool");
        self.write().insert(name, tool);
    }

    /// Unregister a tool by name.
    pub fn unregister(&self, name: &str) -> bool {
        self.write().remove(name).is_some()
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn StepFn>> {
        self.read().get(name).cloned()
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panicking writer cannot leave the map half-updated, so poisoning is ignored.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<dyn StepFn>>> {
        self.tools.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<dyn StepFn>>> {
        self.tools.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
