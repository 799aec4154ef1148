use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use serde_json::{json, Value};

use stepgraph_core::graph::{Edge, GraphDefinition};
use stepgraph_core::run::RunOutcome;
use stepgraph_core::types::StateMap;
use stepgraph_engine::{GraphEngine, NodeFunctions, RunOptions, ToolRegistry};
use stepgraph_store::SqliteStore;
use stepgraph_test_utils::{
    add_to, count_log_lines, counter_loop, int, linear_tool_graph, memory_engine, multiply, state,
};

fn sqlite_engine(path: &std::path::Path) -> GraphEngine {
    let store = Arc::new(SqliteStore::open(path).expect("open sqlite store"));
    GraphEngine::new(store.clone(), store).with_tools(Arc::new(ToolRegistry::new()))
}

#[test]
fn test_linear_graph_runs_in_order() {
    let engine = memory_engine();
    engine.tools().register("double", multiply("x", 2));
    engine.tools().register("increment", add_to("x", 1));
    engine
        .create_graph(linear_tool_graph("math", &[("A", "double"), ("B", "increment")]))
        .unwrap();

    let result = engine
        .run("math", &state(json!({"x": 3})), &RunOptions::default())
        .unwrap();

    assert_eq!(int(&result.state, "x"), 7);
    assert_eq!(count_log_lines(&result, "Starting node"), 2);
    assert!(result.log[0].contains("[A] Starting node. State snapshot keys: [x]"));
    assert!(result.log.iter().any(|l| l.contains("[A] Next -> B")));
    assert_eq!(result.outcome, RunOutcome::Completed);
}

#[test]
fn test_log_lines_carry_utc_timestamp() {
    let engine = memory_engine();
    engine.create_graph(GraphDefinition::new("g").with_node("only")).unwrap();

    let result = engine.run("g", &StateMap::new(), &RunOptions::default()).unwrap();

    for line in &result.log {
        assert!(line.starts_with('['), "line: {}", line);
        let (stamp, rest) = line[1..].split_once("] ").unwrap();
        assert!(stamp.ends_with('Z'), "stamp: {}", stamp);
        assert!(rest.starts_with("[only] "), "rest: {}", rest);
    }
}

#[test]
fn test_conditional_edge_follows_default_branch() {
    let engine = memory_engine();
    let mut branches = BTreeMap::new();
    branches.insert("default".to_string(), json!("low"));
    branches.insert("high".to_string(), json!("high"));
    engine
        .create_graph(
            GraphDefinition::new("branch")
                .with_node("check")
                .with_node("high")
                .with_node("low")
                .with_edge("check", Edge::Conditional(branches)),
        )
        .unwrap();
    let funcs = NodeFunctions::new()
        .with("high", |_: &StateMap| Ok(json!({"path": "high"})))
        .with("low", |_: &StateMap| Ok(json!({"path": "low"})));

    let result = engine
        .run("branch", &StateMap::new(), &RunOptions::default().with_node_functions(funcs))
        .unwrap();

    assert_eq!(result.state["path"], "low");
    assert!(result.log.iter().any(|l| l.contains("[check] No tool or node function; skipping")));
}

#[test]
fn test_ordered_edge_takes_first_target() {
    let engine = memory_engine();
    engine
        .create_graph(
            GraphDefinition::new("fan")
                .with_node("start")
                .with_node("second")
                .with_node("first")
                .with_edge("start", Edge::ordered(["first", "second"])),
        )
        .unwrap();

    let result = engine.run("fan", &StateMap::new(), &RunOptions::default()).unwrap();

    assert!(result.log.iter().any(|l| l.contains("[start] Next -> first")));
    assert_eq!(result.iterations, 2);
}

#[test]
fn test_missing_tool_is_logged_and_run_continues() {
    let engine = memory_engine();
    engine.tools().register("increment", add_to("x", 1));
    engine
        .create_graph(linear_tool_graph("g", &[("A", "ghost"), ("B", "increment")]))
        .unwrap();

    let result = engine
        .run("g", &state(json!({"x": 1})), &RunOptions::default())
        .unwrap();

    assert!(result.log.iter().any(|l| l.contains("[A] Tool 'ghost' not found")));
    assert_eq!(int(&result.state, "x"), 2);
    assert_eq!(result.outcome, RunOutcome::Completed);
}

#[test]
fn test_tool_wins_over_node_function() {
    let engine = memory_engine();
    engine.tools().register("double", multiply("x", 2));
    engine
        .create_graph(GraphDefinition::new("g").with_tool_node("A", "double"))
        .unwrap();
    let funcs = NodeFunctions::new().with("A", add_to("x", 100));

    let result = engine
        .run("g", &state(json!({"x": 5})), &RunOptions::default().with_node_functions(funcs))
        .unwrap();

    assert_eq!(int(&result.state, "x"), 10);
}

#[test]
fn test_non_mapping_output_leaves_state_unchanged() {
    let engine = memory_engine();
    engine.create_graph(GraphDefinition::new("g").with_node("A")).unwrap();
    let funcs = NodeFunctions::new().with("A", |_: &StateMap| Ok(json!([1, 2, 3])));

    let result = engine
        .run("g", &state(json!({"x": 1})), &RunOptions::default().with_node_functions(funcs))
        .unwrap();

    assert_eq!(Value::Object(result.state.clone()), json!({"x": 1}));
    assert!(result.log.iter().any(|l| l.contains("no mapping returned")));
}

#[test]
fn test_panicking_step_becomes_failure() {
    let engine = memory_engine();
    engine
        .create_graph(
            GraphDefinition::new("g")
                .with_node("boom")
                .with_node("after")
                .with_edge("boom", Edge::direct("after")),
        )
        .unwrap();
    let funcs = NodeFunctions::new()
        .with("boom", |_: &StateMap| -> stepgraph_core::traits::StepOutput { panic!("bad input") })
        .with("after", |_: &StateMap| Ok(json!({"reached": true})));

    let result = engine
        .run("g", &StateMap::new(), &RunOptions::default().with_node_functions(funcs))
        .unwrap();

    assert!(result.finished);
    assert!(matches!(result.outcome, RunOutcome::StepFailed { ref node, .. } if node == "boom"));
    assert!(result.state.get("reached").is_none());
    assert!(result.log.iter().any(|l| l.contains("[boom] Exception: step panicked: bad input")));
    assert_eq!(engine.get_run(result.run_id.as_str()).unwrap(), result);
}

#[test]
fn test_concurrent_runs_are_isolated() {
    let engine = Arc::new(memory_engine());
    engine.create_graph(GraphDefinition::new("loop").with_node("loop")).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = engine.clone();
            thread::spawn(move || {
                let options = RunOptions::default()
                    .with_node_functions(NodeFunctions::new().with("loop", counter_loop("loop", 4)));
                engine
                    .run("loop", &state(json!({"worker": i})), &options)
                    .unwrap()
            })
        })
        .collect();

    let mut ids = Vec::new();
    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.join().unwrap();
        assert_eq!(int(&result.state, "counter"), 4);
        assert_eq!(int(&result.state, "worker"), i as i64);
        ids.push(result.run_id.to_string());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8);
    assert_eq!(engine.runs_for_graph("loop").unwrap().len(), 8);
}

#[test]
fn test_sqlite_engine_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("stepgraph.db");

    let run_id = {
        let engine = sqlite_engine(&path);
        engine.tools().register("double", multiply("x", 2));
        engine
            .create_graph(linear_tool_graph("persisted", &[("A", "double")]))
            .unwrap();
        let result = engine
            .run("persisted", &state(json!({"x": 21})), &RunOptions::default())
            .unwrap();
        assert_eq!(int(&result.state, "x"), 42);
        result.run_id.to_string()
    };

    let engine = sqlite_engine(&path);
    assert_eq!(engine.list_graphs().unwrap(), vec!["persisted".to_string()]);
    let stored = engine.get_run(&run_id).unwrap();
    assert_eq!(int(&stored.state, "x"), 42);
    assert_eq!(stored.outcome, RunOutcome::Completed);
    assert_eq!(engine.runs_for_graph("persisted").unwrap(), vec![run_id]);

    let dup = engine.create_graph(linear_tool_graph("persisted", &[("B", "other")]));
    assert!(dup.is_err());
    let graph = engine.get_graph("persisted").unwrap();
    assert_eq!(graph.entry(), Some("A"));
}

#[test]
fn test_seeded_code_review_workflow() {
    let engine = memory_engine();
    stepgraph_workflows::seed_graphs(&engine).unwrap();
    // seeding twice is harmless
    stepgraph_workflows::seed_graphs(&engine).unwrap();
    assert_eq!(
        engine.list_graphs().unwrap(),
        vec![stepgraph_workflows::code_review::GRAPH_ID.to_string()]
    );

    let code = "def main():\n    # TODO wire up\n    run()\n";
    let options = RunOptions::default().with_node_functions(stepgraph_workflows::node_functions());
    let result = engine
        .run(
            stepgraph_workflows::code_review::GRAPH_ID,
            &state(json!({"code": code})),
            &options,
        )
        .unwrap();

    assert_eq!(result.outcome, RunOutcome::Completed);
    assert_eq!(result.state["functions"], json!(["main"]));
    assert_eq!(int(&result.state, "complexity_score"), 2);
    assert_eq!(int(&result.state, "quality_score"), 8);
    assert_eq!(int(&result.state, "issues"), 0);
    assert!(count_log_lines(&result, "[suggest_improvements] Next -> suggest_improvements") >= 1);
}
