//! Graph model: typed nodes, typed edges, and structural validation.
//!
//! The compiler only ever reads an immutable snapshot of the editor's graph.
//! `validate` turns that snapshot into a `ValidatedGraph` with precomputed
//! adjacency; nothing downstream accepts an unvalidated graph.

pub mod error;
pub mod node;
pub mod validate;

pub use error::GraphError;
pub use node::{
    ActionSide, Comparison, ConditionSpec, ExitBasis, ExitKind, LogicOp, Node, NodeKind,
    PriceField, SizingMode, MAX_LOOKBACK, MAX_OFFSET,
};
pub use validate::{validate, ValidatedGraph};

use serde::{Deserialize, Serialize};

use crate::domain::{EdgeId, NodeId};

/// What an edge carries into its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeRole {
    /// Boolean input of a Logic, Action, or (chained) condition node.
    #[default]
    Flow,
    /// Dynamic compare operand of a Price/Indicator/Value node.
    CompareInput,
}

/// A directed connection between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default)]
    pub role: EdgeRole,
}

impl Edge {
    pub fn flow(id: &str, source: &str, target: &str) -> Self {
        Self {
            id: EdgeId::from(id),
            source: NodeId::from(source),
            target: NodeId::from(target),
            role: EdgeRole::Flow,
        }
    }

    pub fn compare_input(id: &str, source: &str, target: &str) -> Self {
        Self {
            role: EdgeRole::CompareInput,
            ..Self::flow(id, source, target)
        }
    }
}

/// The serialized strategy graph as produced by the editor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }
}
