use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use stepgraph_core::error::{Result, StepgraphError};
use stepgraph_core::graph::{Graph, GraphDefinition};
use stepgraph_core::run::{RunOutcome, RunResult};
use stepgraph_core::traits::{GraphStore, RunStore};
use stepgraph_core::types::{RunId, StateMap};

use crate::edge::resolve_next;
use crate::registry::ToolRegistry;
use crate::state::RunState;
use crate::step::{NodeFunctions, StepInvoker, StepOutcome};
use crate::trace::{key_list, RunLog, ENGINE_SCOPE};

/// Step bound used when neither the caller nor the config sets one.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Per-run knobs passed alongside the initial state.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Upper bound on executed node steps.
    pub max_iterations: usize,
    /// Step logic for nodes that do not name a tool.
    pub node_functions: NodeFunctions,
}

impl RunOptions {
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            node_functions: NodeFunctions::new(),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_node_functions(mut self, node_functions: NodeFunctions) -> Self {
        self.node_functions = node_functions;
        self
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITERATIONS)
    }
}

/// Creates graphs, executes runs, and serves finished runs.
///
/// Each call to [`run`](Self::run) owns its working state, so one engine
/// can serve concurrent callers. A run is synchronous: it returns once the
/// loop ends, and a step that never returns blocks it for good.
pub struct GraphEngine {
    graphs: Arc<dyn GraphStore>,
    runs: Arc<dyn RunStore>,
    tools: Arc<ToolRegistry>,
    default_max_iterations: usize,
}

impl GraphEngine {
    /// Create an engine over the given stores, using the global tool registry.
    pub fn new(graphs: Arc<dyn GraphStore>, runs: Arc<dyn RunStore>) -> Self {
        Self {
            graphs,
            runs,
            tools: ToolRegistry::global(),
            default_max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Use a specific tool registry instead of the global one.
    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    /// Set the bound used by [`default_options`](Self::default_options).
    pub fn with_default_max_iterations(mut self, max_iterations: usize) -> Self {
        self.default_max_iterations = max_iterations;
        self
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Options carrying the engine's default bound and no node-functions.
    pub fn default_options(&self) -> RunOptions {
        RunOptions::new(self.default_max_iterations)
    }

    /// Validate and store a graph, returning its id.
    pub fn create_graph(&self, definition: GraphDefinition) -> Result<String> {
        if self.graphs.exists(&definition.graph_id)? {
            return Err(StepgraphError::AlreadyExists(definition.graph_id));
        }
        let graph = Graph::new(definition)?;
        let graph_id = graph.id().to_string();
        self.graphs.put(graph)?;
        info!(graph_id = %graph_id, "Graph created");
        Ok(graph_id)
    }

    pub fn get_graph(&self, graph_id: &str) -> Result<Arc<Graph>> {
        self.graphs
            .get(graph_id)?
            .ok_or_else(|| StepgraphError::GraphNotFound(graph_id.to_string()))
    }

    pub fn list_graphs(&self) -> Result<Vec<String>> {
        self.graphs.list_ids()
    }

    /// Execute a graph against a copy of `initial_state` and store the result.
    ///
    /// The loop stops when edge resolution finds no next node, when
    /// `max_iterations` steps have run, or when a step fails. All three
    /// produce a stored result with `finished = true`; `outcome` tells
    /// them apart.
    pub fn run(
        &self,
        graph_id: &str,
        initial_state: &StateMap,
        options: &RunOptions,
    ) -> Result<RunResult> {
        if options.max_iterations == 0 {
            return Err(StepgraphError::InvalidMaxIterations(0));
        }
        let graph = self.get_graph(graph_id)?;
        let entry = graph
            .entry()
            .ok_or_else(|| StepgraphError::EmptyGraph(graph_id.to_string()))?
            .to_string();

        let run_id = RunId::new();
        let start = Instant::now();
        info!(
            run_id = %run_id,
            graph_id,
            max_iterations = options.max_iterations,
            "Run started"
        );

        let mut state = RunState::from_map(initial_state.clone());
        let mut log = RunLog::new();
        let invoker = StepInvoker::new(&self.tools, &options.node_functions);

        let mut current = Some(entry);
        let mut iterations = 0usize;
        let mut outcome = RunOutcome::Completed;

        while let Some(node) = current.take() {
            if iterations >= options.max_iterations {
                warn!(run_id = %run_id, node = %node, iterations, "Iteration cap reached");
                log.push(ENGINE_SCOPE, "Max iterations reached; aborting loop");
                outcome = RunOutcome::IterationCap {
                    max_iterations: options.max_iterations,
                };
                break;
            }
            iterations += 1;

            log.push(
                &node,
                format!("Starting node. State snapshot keys: {}", key_list(&state.keys())),
            );

            if let StepOutcome::Failed { message } = invoker.invoke(&graph, &node, &mut state, &mut log) {
                warn!(run_id = %run_id, node = %node, error = %message, "Step failed, stopping run");
                log.push(&node, format!("Exception: {}", message));
                outcome = RunOutcome::StepFailed { node, message };
                break;
            }

            let next = resolve_next(&node, &mut state, &graph);
            log.push(&node, format!("Next -> {}", next.node().unwrap_or("None")));
            debug!(run_id = %run_id, node = %node, next = ?next, "Resolved next hop");
            current = next.into_node();
        }

        let result = RunResult {
            run_id: run_id.clone(),
            graph_id: graph_id.to_string(),
            state: state.into_public(),
            log: log.into_lines(),
            finished: true,
            outcome,
            iterations,
        };
        self.runs.put(result.clone())?;

        info!(
            run_id = %run_id,
            graph_id,
            iterations,
            outcome = ?result.outcome,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Run finished"
        );
        Ok(result)
    }

    /// Fetch a finished run.
    pub fn get_run(&self, run_id: &str) -> Result<RunResult> {
        self.runs
            .get(run_id)?
            .ok_or_else(|| StepgraphError::RunNotFound(run_id.to_string()))
    }

    /// Run ids recorded for a graph, oldest first.
    pub fn runs_for_graph(&self, graph_id: &str) -> Result<Vec<String>> {
        self.runs.list_for_graph(graph_id)
    }
}
