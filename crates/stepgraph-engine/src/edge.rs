use serde_json::Value;
use tracing::warn;

use stepgraph_core::graph::{Edge, Graph, DEFAULT_BRANCH};

use crate::state::RunState;

/// Where the loop goes after a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextHop {
    /// A step set the override key.
    Override(String),
    /// Followed the graph's static edge.
    Edge(String),
    /// Nothing to follow; the run is complete.
    End,
}

impl NextHop {
    pub fn node(&self) -> Option<&str> {
        match self {
            Self::Override(n) | Self::Edge(n) => Some(n),
            Self::End => None,
        }
    }

    pub fn into_node(self) -> Option<String> {
        match self {
            Self::Override(n) | Self::Edge(n) => Some(n),
            Self::End => None,
        }
    }
}

/// Decide the node after `current`.
///
/// A truthy override in the state is consumed and wins over any static
/// edge; a non-string override is used by its JSON text. Self-loops are
/// allowed; only the iteration cap bounds them.
pub fn resolve_next(current: &str, state: &mut RunState, graph: &Graph) -> NextHop {
    match state.take_next_override() {
        Some(Value::String(target)) => return NextHop::Override(target),
        Some(other) => {
            // Non-string overrides name the node by their JSON text
            let target = other.to_string();
            warn!(node = %current, target = %target, "Next override is not a string");
            return NextHop::Override(target);
        }
        None => {}
    }

    match graph.edge(current).and_then(static_target) {
        Some(target) => NextHop::Edge(target.to_string()),
        None => NextHop::End,
    }
}

/// Target of a static edge by shape. Conditional edges only follow their
/// `default` branch; other condition keys are not evaluated.
pub fn static_target(edge: &Edge) -> Option<&str> {
    let target = match edge {
        Edge::Direct(to) => Some(to.as_str()),
        Edge::Conditional(branches) => branches.get(DEFAULT_BRANCH).and_then(Value::as_str),
        Edge::Ordered(targets) => targets.first().map(String::as_str),
    };
    target.filter(|t| !t.is_empty())
}
