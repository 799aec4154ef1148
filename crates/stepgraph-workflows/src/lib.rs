//! Workflows shipped with stepgraph.
//!
//! A workflow contributes node-functions (attached to each run), the same
//! steps as registered tools, and a seed graph created at startup.

pub mod code_review;

use stepgraph_core::error::{Result, StepgraphError};
use stepgraph_engine::{GraphEngine, NodeFunctions, ToolRegistry};
use tracing::{debug, info};

/// Node-functions of every bundled workflow, merged into one table.
pub fn node_functions() -> NodeFunctions {
    code_review::node_functions()
}

/// Register every bundled step as a tool under its node name, so graphs
/// other than the seed graph can reference them through `tool`.
pub fn register_tools(registry: &ToolRegistry) {
    code_review::register_tools(registry);
    debug!(tools = registry.len(), "Registered workflow tools");
}

/// Create the bundled seed graphs. Graphs that already exist are left as is.
pub fn seed_graphs(engine: &GraphEngine) -> Result<()> {
    match engine.create_graph(code_review::graph_definition()) {
        Ok(graph_id) => info!(graph_id = %graph_id, "Seeded workflow graph"),
        Err(StepgraphError::AlreadyExists(graph_id)) => {
            debug!(graph_id = %graph_id, "Seed graph already present")
        }
        Err(e) => return Err(e),
    }
    Ok(())
}
