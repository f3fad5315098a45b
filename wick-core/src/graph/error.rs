use crate::domain::{EdgeId, NodeId};

/// Structural problems that make a graph uncompilable.
///
/// Always surfaced before any predicate compilation is attempted, and always
/// a pure function of the graph: no variant depends on market data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("graph has no action nodes")]
    NoActionNodes,
    #[error("edge {0} references a node that does not exist")]
    DanglingEdge(EdgeId),
    #[error("cycle detected through node {0}")]
    CycleDetected(NodeId),
    #[error("node {0} has more than one compare input")]
    DuplicateCompareInput(NodeId),
    #[error("node id {0} is used more than once")]
    DuplicateNode(NodeId),
    #[error("node {0} is referenced but not defined")]
    UnknownNode(NodeId),
    #[error("node {node} is a {found} node where {expected} was expected")]
    UnexpectedNodeKind {
        node: NodeId,
        found: &'static str,
        expected: &'static str,
    },
    #[error("edge {edge} is not allowed: {reason}")]
    InvalidEdge { edge: EdgeId, reason: String },
    #[error("NOT node {node} needs exactly one input, found {inputs}")]
    NotArity { node: NodeId, inputs: usize },
    #[error("action {node} has invalid sizing: {reason}")]
    InvalidSizing { node: NodeId, reason: String },
    #[error("exit {node} is invalid: {reason}")]
    InvalidExit { node: NodeId, reason: String },
    #[error("node {node} parameter `{param}` {reason}")]
    InvalidParameter {
        node: NodeId,
        param: String,
        reason: String,
    },
}
