use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Result, StepgraphError};

/// Key a conditional edge must carry; the only branch the engine follows.
pub const DEFAULT_BRANCH: &str = "default";

/// A named step in a graph.
///
/// On the wire a node is either a bare name or `{"name": .., "tool": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "NodeDescriptor")]
pub struct NodeDef {
    pub name: String,
    /// Registered tool backing this node. `None` means the node runs a
    /// caller-supplied node-function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NodeDescriptor {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        tool: Option<String>,
    },
}

impl From<NodeDescriptor> for NodeDef {
    fn from(d: NodeDescriptor) -> Self {
        match d {
            NodeDescriptor::Name(name) => Self { name, tool: None },
            NodeDescriptor::Full { name, tool } => Self { name, tool },
        }
    }
}

impl NodeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tool: None,
        }
    }

    pub fn with_tool(name: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tool: Some(tool.into()),
        }
    }
}

/// Static rule for choosing the node after a given node.
///
/// Serialized untagged so the wire forms are a string, an object, or an
/// array respectively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Edge {
    /// Always go to the named node.
    Direct(String),
    /// Branch table keyed by condition; only `default` is followed.
    ///
    /// Values are kept as raw JSON: other branches are never evaluated, and
    /// a `null` default means no static edge.
    Conditional(BTreeMap<String, Value>),
    /// Candidate list; the first entry is followed.
    Ordered(Vec<String>),
}

impl Edge {
    pub fn direct(to: impl Into<String>) -> Self {
        Self::Direct(to.into())
    }

    /// Conditional edge with only a default branch.
    pub fn default_branch(to: impl Into<String>) -> Self {
        let mut branches = BTreeMap::new();
        branches.insert(DEFAULT_BRANCH.to_string(), Value::String(to.into()));
        Self::Conditional(branches)
    }

    pub fn ordered<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Ordered(targets.into_iter().map(Into::into).collect())
    }
}

/// Static description of a workflow: ordered nodes plus an edge table.
///
/// The first node is the entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDefinition {
    pub graph_id: String,
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
    #[serde(default, deserialize_with = "deserialize_edges")]
    pub edges: BTreeMap<String, Edge>,
}

/// `null` edge entries mean "no static edge" and are dropped.
fn deserialize_edges<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, Edge>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, Option<Edge>> = BTreeMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(from, edge)| edge.map(|e| (from, e)))
        .collect())
}

impl GraphDefinition {
    pub fn new(graph_id: impl Into<String>) -> Self {
        Self {
            graph_id: graph_id.into(),
            nodes: vec![],
            edges: BTreeMap::new(),
        }
    }

    /// Append a node backed by a node-function.
    pub fn with_node(mut self, name: impl Into<String>) -> Self {
        self.nodes.push(NodeDef::new(name));
        self
    }

    /// Append a node backed by a registered tool.
    pub fn with_tool_node(mut self, name: impl Into<String>, tool: impl Into<String>) -> Self {
        self.nodes.push(NodeDef::with_tool(name, tool));
        self
    }

    /// Set the static edge leaving `from`.
    pub fn with_edge(mut self, from: impl Into<String>, edge: Edge) -> Self {
        self.edges.insert(from.into(), edge);
        self
    }
}

/// Normalized, validated form of a [`GraphDefinition`] as kept by a graph store.
#[derive(Debug, Clone)]
pub struct Graph {
    definition: GraphDefinition,
    index: HashMap<String, usize>,
}

impl Graph {
    /// Validate a definition and build its node lookup.
    ///
    /// An empty node list is accepted here; running such a graph fails.
    pub fn new(definition: GraphDefinition) -> Result<Self> {
        if definition.graph_id.trim().is_empty() {
            return Err(StepgraphError::InvalidGraph("graph_id is empty".into()));
        }

        let mut index = HashMap::with_capacity(definition.nodes.len());
        for (pos, node) in definition.nodes.iter().enumerate() {
            if node.name.is_empty() {
                return Err(StepgraphError::InvalidGraph(format!(
                    "node at position {} has an empty name",
                    pos
                )));
            }
            if index.insert(node.name.clone(), pos).is_some() {
                return Err(StepgraphError::InvalidGraph(format!(
                    "duplicate node name '{}'",
                    node.name
                )));
            }
        }

        for (from, edge) in &definition.edges {
            if let Edge::Conditional(branches) = edge {
                match branches.get(DEFAULT_BRANCH) {
                    Some(Value::String(_)) | Some(Value::Null) => {}
                    Some(other) => {
                        return Err(StepgraphError::InvalidGraph(format!(
                            "conditional edge from '{}' has a non-string '{}' branch: {}",
                            from, DEFAULT_BRANCH, other
                        )));
                    }
                    None => {
                        return Err(StepgraphError::InvalidGraph(format!(
                            "conditional edge from '{}' has no '{}' branch",
                            from, DEFAULT_BRANCH
                        )));
                    }
                }
            }
        }

        Ok(Self { definition, index })
    }

    pub fn id(&self) -> &str {
        &self.definition.graph_id
    }

    /// Name of the first node, if any.
    pub fn entry(&self) -> Option<&str> {
        self.definition.nodes.first().map(|n| n.name.as_str())
    }

    pub fn node(&self, name: &str) -> Option<&NodeDef> {
        self.index.get(name).map(|&pos| &self.definition.nodes[pos])
    }

    pub fn edge(&self, from: &str) -> Option<&Edge> {
        self.definition.edges.get(from)
    }

    pub fn nodes(&self) -> &[NodeDef] {
        &self.definition.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.definition.nodes.is_empty()
    }

    pub fn definition(&self) -> &GraphDefinition {
        &self.definition
    }
}
