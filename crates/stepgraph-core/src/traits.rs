use std::sync::Arc;

use crate::error::{Result, StepError};
use crate::graph::Graph;
use crate::run::RunResult;
use crate::types::StateMap;

/// What a step hands back: an update to merge, or a failure.
///
/// Only a JSON object is merged; any other value leaves the state as is.
pub type StepOutput = std::result::Result<serde_json::Value, StepError>;

/// A state-transform function run for one node.
///
/// Implemented for every `Fn(&StateMap) -> StepOutput` closure, so both
/// registered tools and run-scoped node-functions are plain closures.
/// Steps run synchronously on the run's thread and are not interrupted:
/// a step that never returns blocks its run.
pub trait StepFn: Send + Sync + 'static {
    fn apply(&self, state: &StateMap) -> StepOutput;
}

impl<F> StepFn for F
where
    F: Fn(&StateMap) -> StepOutput + Send + Sync + 'static,
{
    fn apply(&self, state: &StateMap) -> StepOutput {
        self(state)
    }
}

/// Graph store: maps graph ids to graphs. Shared across runs.
pub trait GraphStore: Send + Sync + 'static {
    /// Insert a graph; fails with `AlreadyExists` without touching the
    /// stored definition when the id is taken.
    fn put(&self, graph: Graph) -> Result<()>;

    fn get(&self, graph_id: &str) -> Result<Option<Arc<Graph>>>;

    fn exists(&self, graph_id: &str) -> Result<bool>;

    /// All graph ids, sorted.
    fn list_ids(&self) -> Result<Vec<String>>;
}

/// Run store: maps run ids to finished runs. Shared across runs.
pub trait RunStore: Send + Sync + 'static {
    fn put(&self, result: RunResult) -> Result<()>;

    fn get(&self, run_id: &str) -> Result<Option<RunResult>>;

    /// Run ids recorded for a graph, oldest first.
    fn list_for_graph(&self, graph_id: &str) -> Result<Vec<String>>;
}
