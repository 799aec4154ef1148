use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use stepgraph_core::error::StepError;
use stepgraph_core::graph::Graph;
use stepgraph_core::traits::{StepFn, StepOutput};
use stepgraph_core::types::StateMap;

use crate::registry::ToolRegistry;
use crate::state::RunState;
use crate::trace::{key_list, RunLog};

/// Caller-supplied step logic for one run, keyed by node name.
///
/// Passed next to the initial state rather than inside it. Nodes without a
/// `tool` are looked up here.
#[derive(Clone, Default)]
pub struct NodeFunctions {
    functions: HashMap<String, Arc<dyn StepFn>>,
}

impl NodeFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a closure for `node`, replacing any earlier one.
    pub fn insert<F>(&mut self, node: impl Into<String>, function: F)
    where
        F: Fn(&StateMap) -> StepOutput + Send + Sync + 'static,
    {
        self.functions.insert(node.into(), Arc::new(function));
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with<F>(mut self, node: impl Into<String>, function: F) -> Self
    where
        F: Fn(&StateMap) -> StepOutput + Send + Sync + 'static,
    {
        self.insert(node, function);
        self
    }

    pub fn get(&self, node: &str) -> Option<Arc<dyn StepFn>> {
        self.functions.get(node).cloned()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for NodeFunctions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("NodeFunctions").field("nodes", &names).finish()
    }
}

/// Result of invoking one node's step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step ran; lists the keys merged into the state.
    Applied { merged: Vec<String> },
    /// No tool or node-function was available; the state is unchanged.
    Skipped,
    /// The step reported a failure (or panicked).
    Failed { message: String },
}

/// Resolves a node to its step, runs it, and merges the result.
pub struct StepInvoker<'a> {
    tools: &'a ToolRegistry,
    node_functions: &'a NodeFunctions,
}

impl<'a> StepInvoker<'a> {
    pub fn new(tools: &'a ToolRegistry, node_functions: &'a NodeFunctions) -> Self {
        Self {
            tools,
            node_functions,
        }
    }

    /// Run the step for `node` against `state`, appending trace lines to `log`.
    ///
    /// Missing tools and node-functions are not errors: the node becomes a
    /// no-op. A failure leaves the state untouched.
    pub fn invoke(
        &self,
        graph: &Graph,
        node: &str,
        state: &mut RunState,
        log: &mut RunLog,
    ) -> StepOutcome {
        let tool_name = graph.node(node).and_then(|n| n.tool.as_deref());

        let (step, label) = match tool_name {
            Some(tool_name) => match self.tools.get(tool_name) {
                Some(tool) => (tool, format!("Tool '{}'", tool_name)),
                None => {
                    warn!(node, tool = tool_name, "Tool not registered, skipping node");
                    log.push(node, format!("Tool '{}' not found", tool_name));
                    return StepOutcome::Skipped;
                }
            },
            None => match self.node_functions.get(node) {
                Some(function) => (function, "Node function".to_string()),
                None => {
                    debug!(node, "No tool or node function");
                    log.push(node, "No tool or node function; skipping");
                    return StepOutcome::Skipped;
                }
            },
        };

        match call_step(step.as_ref(), state.data()) {
            Ok(Value::Object(update)) => {
                let merged = state.merge(update);
                log.push(
                    node,
                    format!("{} executed; merged keys: {}", label, key_list(&merged)),
                );
                StepOutcome::Applied { merged }
            }
            Ok(_) => {
                log.push(node, format!("{} executed; no mapping returned, state unchanged", label));
                StepOutcome::Applied { merged: vec![] }
            }
            Err(e) => StepOutcome::Failed { message: e.message },
        }
    }
}

/// Invoke a step, turning a panic into a step failure.
fn call_step(step: &dyn StepFn, state: &StateMap) -> StepOutput {
    panic::catch_unwind(AssertUnwindSafe(|| step.apply(state)))
        .unwrap_or_else(|payload| Err(StepError::new(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("step panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("step panicked: {}", s)
    } else {
        "step panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stepgraph_core::graph::GraphDefinition;

    fn graph() -> Graph {
        Graph::new(
            GraphDefinition::new("g")
                .with_tool_node("double", "double")
                .with_tool_node("ghost", "not_registered")
                .with_node("custom"),
        )
        .unwrap()
    }

    fn state_x(x: i64) -> RunState {
        let mut state = RunState::new();
        state.set("x", json!(x));
        state
    }

    fn registry() -> ToolRegistry {
        let tools = ToolRegistry::new();
        tools.register("double", |s: &StateMap| {
            let x = s.get("x").and_then(Value::as_i64).unwrap_or(0);
            Ok(json!({ "x": x * 2 }))
        });
        tools
    }

    #[test]
    fn test_tool_step_merges() {
        let tools = registry();
        let funcs = NodeFunctions::new();
        let mut state = state_x(3);
        let mut log = RunLog::new();

        let outcome = StepInvoker::new(&tools, &funcs).invoke(&graph(), "double", &mut state, &mut log);

        assert_eq!(outcome, StepOutcome::Applied { merged: vec!["x".into()] });
        assert_eq!(state.get("x"), Some(&json!(6)));
        assert!(log.lines()[0].contains("Tool 'double' executed; merged keys: [x]"));
    }

    #[test]
    fn test_missing_tool_is_noop() {
        let tools = registry();
        let funcs = NodeFunctions::new();
        let mut state = state_x(3);
        let mut log = RunLog::new();

        let outcome = StepInvoker::new(&tools, &funcs).invoke(&graph(), "ghost", &mut state, &mut log);

        assert_eq!(outcome, StepOutcome::Skipped);
        assert_eq!(state.get("x"), Some(&json!(3)));
        assert!(log.lines()[0].contains("Tool 'not_registered' not found"));
    }

    #[test]
    fn test_node_function_used_for_toolless_node() {
        let tools = ToolRegistry::new();
        let funcs = NodeFunctions::new().with("custom", |_: &StateMap| Ok(json!({"seen": true})));
        let mut state = RunState::new();
        let mut log = RunLog::new();

        let outcome = StepInvoker::new(&tools, &funcs).invoke(&graph(), "custom", &mut state, &mut log);

        assert_eq!(outcome, StepOutcome::Applied { merged: vec!["seen".into()] });
        assert!(log.lines()[0].contains("Node function executed"));
    }

    #[test]
    fn test_node_function_reaches_undeclared_node() {
        let tools = ToolRegistry::new();
        let funcs = NodeFunctions::new().with("extra", |_: &StateMap| Ok(json!({"extra": 1})));
        let mut state = RunState::new();
        let mut log = RunLog::new();

        let outcome = StepInvoker::new(&tools, &funcs).invoke(&graph(), "extra", &mut state, &mut log);
        assert!(matches!(outcome, StepOutcome::Applied { .. }));
    }

    #[test]
    fn test_tool_takes_precedence_over_node_function() {
        let tools = registry();
        let funcs = NodeFunctions::new().with("double", |_: &StateMap| Ok(json!({"x": -1})));
        let mut state = state_x(5);
        let mut log = RunLog::new();

        StepInvoker::new(&tools, &funcs).invoke(&graph(), "double", &mut state, &mut log);
        assert_eq!(state.get("x"), Some(&json!(10)));
    }

    #[test]
    fn test_no_step_skips() {
        let tools = ToolRegistry::new();
        let funcs = NodeFunctions::new();
        let mut state = RunState::new();
        let mut log = RunLog::new();

        let outcome = StepInvoker::new(&tools, &funcs).invoke(&graph(), "custom", &mut state, &mut log);

        assert_eq!(outcome, StepOutcome::Skipped);
        assert!(log.lines()[0].contains("No tool or node function; skipping"));
    }

    #[test]
    fn test_non_mapping_result_leaves_state() {
        let tools = ToolRegistry::new();
        let funcs = NodeFunctions::new().with("custom", |_: &StateMap| Ok(json!([1, 2, 3])));
        let mut state = state_x(1);
        let mut log = RunLog::new();

        let outcome = StepInvoker::new(&tools, &funcs).invoke(&graph(), "custom", &mut state, &mut log);

        assert_eq!(outcome, StepOutcome::Applied { merged: vec![] });
        assert_eq!(state.keys(), vec!["x"]);
    }

    #[test]
    fn test_failure_is_reported() {
        let tools = ToolRegistry::new();
        let funcs = NodeFunctions::new().with("custom", |_: &StateMap| Err("bad input".into()));
        let mut state = state_x(1);
        let mut log = RunLog::new();

        let outcome = StepInvoker::new(&tools, &funcs).invoke(&graph(), "custom", &mut state, &mut log);

        assert_eq!(outcome, StepOutcome::Failed { message: "bad input".into() });
        assert_eq!(state.get("x"), Some(&json!(1)));
    }

    #[test]
    fn test_panic_becomes_failure() {
        let tools = ToolRegistry::new();
        let funcs = NodeFunctions::new().with("custom", |_: &StateMap| -> StepOutput {
            panic!("index out of range")
        });
        let mut state = RunState::new();
        let mut log = RunLog::new();

        let outcome = StepInvoker::new(&tools, &funcs).invoke(&graph(), "custom", &mut state, &mut log);

        match outcome {
            StepOutcome::Failed { message } => assert!(message.contains("index out of range")),
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
