//! Code review workflow.
//!
//! Reads Python-style source from the `code` key and walks four steps:
//! extract function names, score complexity, count issues, then refine a
//! quality score by looping on itself until it is good enough.

use serde_json::{json, Value};

use stepgraph_core::graph::{Edge, GraphDefinition};
use stepgraph_core::traits::StepOutput;
use stepgraph_core::types::{StateMap, NEXT_OVERRIDE_KEY};
use stepgraph_engine::{NodeFunctions, ToolRegistry};

pub const GRAPH_ID: &str = "code_review_v1";

pub const EXTRACT_FUNCTIONS: &str = "extract_functions";
pub const CHECK_COMPLEXITY: &str = "check_complexity";
pub const DETECT_ISSUES: &str = "detect_issues";
pub const SUGGEST_IMPROVEMENTS: &str = "suggest_improvements";

/// Refinement stops once the quality score reaches this value.
pub const QUALITY_THRESHOLD: i64 = 7;
/// Refinement stops after this many passes regardless of score.
pub const MAX_ATTEMPTS: i64 = 5;

const ATTEMPTS_KEY: &str = "_suggest_attempts";
const MAX_LINE_LEN: usize = 120;

/// Seed graph wiring the four steps in order.
pub fn graph_definition() -> GraphDefinition {
    GraphDefinition::new(GRAPH_ID)
        .with_node(EXTRACT_FUNCTIONS)
        .with_node(CHECK_COMPLEXITY)
        .with_node(DETECT_ISSUES)
        .with_node(SUGGEST_IMPROVEMENTS)
        .with_edge(EXTRACT_FUNCTIONS, Edge::direct(CHECK_COMPLEXITY))
        .with_edge(CHECK_COMPLEXITY, Edge::direct(DETECT_ISSUES))
        .with_edge(DETECT_ISSUES, Edge::direct(SUGGEST_IMPROVEMENTS))
}

pub fn node_functions() -> NodeFunctions {
    NodeFunctions::new()
        .with(EXTRACT_FUNCTIONS, extract_functions)
        .with(CHECK_COMPLEXITY, check_complexity)
        .with(DETECT_ISSUES, detect_issues)
        .with(SUGGEST_IMPROVEMENTS, suggest_improvements)
}

pub fn register_tools(registry: &ToolRegistry) {
    registry.register(EXTRACT_FUNCTIONS, extract_functions);
    registry.register(CHECK_COMPLEXITY, check_complexity);
    registry.register(DETECT_ISSUES, detect_issues);
    registry.register(SUGGEST_IMPROVEMENTS, suggest_improvements);
}

fn code(state: &StateMap) -> &str {
    state.get("code").and_then(Value::as_str).unwrap_or("")
}

fn int(state: &StateMap, key: &str) -> i64 {
    state.get(key).and_then(Value::as_i64).unwrap_or(0)
}

/// Names of `def` statements, in source order.
pub fn extract_functions(state: &StateMap) -> StepOutput {
    let functions: Vec<&str> = code(state)
        .lines()
        .filter_map(|line| line.trim().strip_prefix("def "))
        .map(|rest| rest.split('(').next().unwrap_or("").trim())
        .collect();
    Ok(json!({ "functions": functions }))
}

/// Two points per function plus one per hundred characters of source.
pub fn check_complexity(state: &StateMap) -> StepOutput {
    let functions = state
        .get("functions")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    let score = functions * 2 + code(state).chars().count() / 100;
    Ok(json!({ "complexity_score": score }))
}

/// One issue per TODO marker and one per overlong line.
pub fn detect_issues(state: &StateMap) -> StepOutput {
    let issues: usize = code(state)
        .lines()
        .map(|line| {
            usize::from(line.contains("TODO")) + usize::from(line.chars().count() > MAX_LINE_LEN)
        })
        .sum();
    Ok(json!({ "issues": issues }))
}

/// One refinement pass: quality +2, issues -1. Loops back to itself until
/// the quality threshold or the attempt limit is reached.
pub fn suggest_improvements(state: &StateMap) -> StepOutput {
    let attempts = int(state, ATTEMPTS_KEY) + 1;
    let quality_score = int(state, "quality_score") + 2;
    let issues = (int(state, "issues") - 1).max(0);

    if quality_score >= QUALITY_THRESHOLD || attempts >= MAX_ATTEMPTS {
        return Ok(json!({
            "issues": issues,
            "quality_score": quality_score,
        }));
    }

    let mut update = StateMap::new();
    update.insert("issues".into(), json!(issues));
    update.insert("quality_score".into(), json!(quality_score));
    update.insert(ATTEMPTS_KEY.into(), json!(attempts));
    update.insert(NEXT_OVERRIDE_KEY.into(), json!(SUGGEST_IMPROVEMENTS));
    Ok(Value::Object(update))
}
