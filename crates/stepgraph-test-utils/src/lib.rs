//! Fixtures shared by stepgraph tests.

use std::sync::Arc;

use serde_json::{json, Value};

use stepgraph_core::graph::{Edge, GraphDefinition};
use stepgraph_core::run::RunResult;
use stepgraph_core::traits::StepOutput;
use stepgraph_core::types::{StateMap, NEXT_OVERRIDE_KEY};
use stepgraph_engine::{GraphEngine, ToolRegistry};
use stepgraph_store::{MemoryGraphStore, MemoryRunStore};

/// Engine over fresh in-memory stores with its own empty tool registry.
pub fn memory_engine() -> GraphEngine {
    GraphEngine::new(
        Arc::new(MemoryGraphStore::new()),
        Arc::new(MemoryRunStore::new()),
    )
    .with_tools(Arc::new(ToolRegistry::new()))
}

/// Build a StateMap from a JSON object literal.
///
/// Panics if `value` is not an object.
pub fn state(value: Value) -> StateMap {
    match value {
        Value::Object(map) => map,
        other => panic!("state fixture must be a JSON object, got {}", other),
    }
}

/// Read an integer from a state, treating anything else as zero.
pub fn int(state: &StateMap, key: &str) -> i64 {
    state.get(key).and_then(Value::as_i64).unwrap_or(0)
}

/// Graph whose nodes run in declaration order, each backed by a tool.
pub fn linear_tool_graph(graph_id: &str, nodes: &[(&str, &str)]) -> GraphDefinition {
    let mut def = GraphDefinition::new(graph_id);
    for (name, tool) in nodes {
        def = def.with_tool_node(*name, *tool);
    }
    for pair in nodes.windows(2) {
        def = def.with_edge(pair[0].0, Edge::direct(pair[1].0));
    }
    def
}

/// Step that adds `delta` to `key`.
pub fn add_to(key: &'static str, delta: i64) -> impl Fn(&StateMap) -> StepOutput + Send + Sync + 'static {
    move |s: &StateMap| -> StepOutput { Ok(json!({ key: int(s, key) + delta })) }
}

/// Step that multiplies `key` by `factor`.
pub fn multiply(key: &'static str, factor: i64) -> impl Fn(&StateMap) -> StepOutput + Send + Sync + 'static {
    move |s: &StateMap| -> StepOutput { Ok(json!({ key: int(s, key) * factor })) }
}

/// Step that increments `counter` and routes back to `node` until the
/// counter reaches `stop_at`.
pub fn counter_loop(node: &'static str, stop_at: i64) -> impl Fn(&StateMap) -> StepOutput + Send + Sync + 'static {
    move |s: &StateMap| -> StepOutput {
        let counter = int(s, "counter") + 1;
        let mut update = StateMap::new();
        update.insert("counter".into(), json!(counter));
        if counter < stop_at {
            update.insert(NEXT_OVERRIDE_KEY.into(), json!(node));
        }
        Ok(Value::Object(update))
    }
}

/// Number of trace lines containing `needle`.
pub fn count_log_lines(result: &RunResult, needle: &str) -> usize {
    result.log.iter().filter(|l| l.contains(needle)).count()
}
