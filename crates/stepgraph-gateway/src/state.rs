use std::sync::Arc;

use stepgraph_engine::{GraphEngine, NodeFunctions};

/// Shared application state for axum handlers.
pub struct AppState {
    pub engine: Arc<GraphEngine>,
    /// Attached to every run started through the gateway.
    pub node_functions: NodeFunctions,
}
