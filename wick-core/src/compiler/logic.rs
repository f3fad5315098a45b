//! Logic composer: AND / OR / NOT over flow parents.

use std::collections::HashSet;

use super::context::CompileContext;
use super::predicate::Predicate;
use crate::domain::NodeId;
use crate::graph::{GraphError, LogicOp};

impl CompileContext<'_> {
    pub(crate) fn compile_logic(
        &mut self,
        id: &NodeId,
        op: LogicOp,
        visited: &mut HashSet<NodeId>,
    ) -> Result<Predicate, GraphError> {
        let graph = self.graph;
        let parents = graph.flow_parents(id);
        match op {
            LogicOp::And => Ok(Predicate::all(self.compile_parents(parents, visited)?)),
            LogicOp::Or => Ok(Predicate::any(self.compile_parents(parents, visited)?)),
            LogicOp::Not => match parents {
                [only] => Ok(Predicate::not(self.compile_condition(only, visited)?)),
                _ => Err(GraphError::NotArity {
                    node: id.clone(),
                    inputs: parents.len(),
                }),
            },
        }
    }

    pub(crate) fn compile_parents(
        &mut self,
        parents: &[NodeId],
        visited: &mut HashSet<NodeId>,
    ) -> Result<Vec<Predicate>, GraphError> {
        parents
            .iter()
            .map(|parent| self.compile_condition(parent, visited))
            .collect()
    }
}
