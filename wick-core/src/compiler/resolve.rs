//! Value resolver: node reference + bar offset -> `Expression`.

use super::context::CompileContext;
use super::expr::Expression;
use crate::domain::NodeId;
use crate::graph::{GraphError, NodeKind};

impl CompileContext<'_> {
    /// Resolve a condition node to the scalar it produces, `bar_offset` closed
    /// bars back.
    ///
    /// Builds a descriptor only; no market data is read. Indicator references
    /// are registered as requirements as a side effect of resolution.
    pub(crate) fn resolve(
        &mut self,
        id: &NodeId,
        bar_offset: usize,
    ) -> Result<Expression, GraphError> {
        let graph = self.graph;
        let node = graph.node(id)?;
        match &node.kind {
            NodeKind::Price { field, .. } => Ok(Expression::Price {
                field: *field,
                offset: bar_offset,
            }),
            NodeKind::Indicator { .. } => {
                let spec = self.indicator_spec(node)?;
                self.require(&spec);
                Ok(Expression::Indicator {
                    spec,
                    offset: bar_offset,
                })
            }
            NodeKind::Value { value, .. } => Ok(Expression::literal(*value)),
            NodeKind::Logic { .. } | NodeKind::Action { .. } | NodeKind::Exit { .. } => {
                Err(GraphError::UnexpectedNodeKind {
                    node: id.clone(),
                    found: node.kind_name(),
                    expected: "a price, indicator or value",
                })
            }
        }
    }
}
