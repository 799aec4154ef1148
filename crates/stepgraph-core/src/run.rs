use serde::{Deserialize, Serialize};

use crate::types::{RunId, StateMap};

/// Why a run's loop stopped.
///
/// `RunResult::finished` is true for every variant; this is what tells a
/// normal completion apart from a capped or aborted one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Edge resolution yielded no next node.
    Completed,
    /// The loop hit `max_iterations` before resolving to an end.
    IterationCap { max_iterations: usize },
    /// A step reported a failure; the loop stopped after that node.
    StepFailed { node: String, message: String },
}

/// Immutable record of one finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: RunId,
    pub graph_id: String,
    /// Final state with internal keys removed.
    pub state: StateMap,
    /// Human-readable trace, one line per event, in order.
    pub log: Vec<String>,
    pub finished: bool,
    pub outcome: RunOutcome,
    /// Number of node steps executed.
    #[serde(default)]
    pub iterations: usize,
}
