//! Condition compiler: comparison + operand + lookback -> `Predicate`.

use std::collections::HashSet;

use super::context::CompileContext;
use super::expr::Expression;
use super::predicate::{CompareOp, Predicate};
use super::warning::CompileWarning;
use crate::domain::NodeId;
use crate::graph::{Comparison, ConditionSpec, GraphError, Node, NodeKind};

impl CompileContext<'_> {
    /// Compile the predicate a node contributes to whatever it flows into.
    ///
    /// `visited` holds the nodes on the current path only: a node is removed
    /// again on the way back up, so a source shared by sibling branches is
    /// compiled once per branch. Meeting a node already on the path means a
    /// flow cycle, which validation rejects; it is reported the same way here
    /// rather than being masked.
    pub(crate) fn compile_condition(
        &mut self,
        id: &NodeId,
        visited: &mut HashSet<NodeId>,
    ) -> Result<Predicate, GraphError> {
        if !visited.insert(id.clone()) {
            return Err(GraphError::CycleDetected(id.clone()));
        }
        let compiled = self.compile_node(id, visited);
        visited.remove(id);
        compiled
    }

    fn compile_node(
        &mut self,
        id: &NodeId,
        visited: &mut HashSet<NodeId>,
    ) -> Result<Predicate, GraphError> {
        let graph = self.graph;
        let node = graph.node(id)?;
        let condition = match &node.kind {
            NodeKind::Logic { op } => return self.compile_logic(id, *op, visited),
            NodeKind::Price { condition, .. }
            | NodeKind::Indicator { condition, .. }
            | NodeKind::Value { condition, .. } => condition,
            NodeKind::Action { .. } | NodeKind::Exit { .. } => {
                return Err(GraphError::UnexpectedNodeKind {
                    node: id.clone(),
                    found: node.kind_name(),
                    expected: "a condition or logic",
                })
            }
        };

        // Chained conditions: own comparison first, then every flow parent.
        let mut parts = vec![self.lookback_condition(node, condition)?];
        for parent in graph.flow_parents(id) {
            parts.push(self.compile_condition(parent, visited)?);
        }
        Ok(Predicate::all(parts))
    }

    /// Lookback N > 0 is the disjunction of the plain comparison at shifts
    /// 0..N. Every shift goes through `comparison_at`, so crossovers and
    /// compare inputs behave identically with and without a window.
    fn lookback_condition(
        &mut self,
        node: &Node,
        condition: &ConditionSpec,
    ) -> Result<Predicate, GraphError> {
        if condition.lookback <= 1 {
            return self.comparison_at(node, condition, 0);
        }
        let shifted = (0..condition.lookback)
            .map(|shift| self.comparison_at(node, condition, shift))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Predicate::any(shifted))
    }

    /// The lookback-free comparison, with every offset moved `shift` bars back.
    fn comparison_at(
        &mut self,
        node: &Node,
        condition: &ConditionSpec,
        shift: usize,
    ) -> Result<Predicate, GraphError> {
        // Validation caps offset and lookback, so these sums cannot overflow.
        let offset = condition.offset + shift;
        let current = self.resolve(&node.id, offset)?;
        let current_operand = self.compare_operand(node, condition, offset)?;

        if let Some(op) = CompareOp::from_comparison(condition.comparison) {
            return Ok(Predicate::compare(current, op, current_operand));
        }

        let (before, after) = match condition.comparison {
            Comparison::CrossesBelow => (CompareOp::Ge, CompareOp::Lt),
            _ => (CompareOp::Le, CompareOp::Gt),
        };
        let previous = self.resolve(&node.id, offset + 1)?;
        let previous_operand = self.compare_operand(node, condition, offset + 1)?;
        Ok(Predicate::all(vec![
            Predicate::compare(previous, before, previous_operand),
            Predicate::compare(current, after, current_operand),
        ]))
    }

    /// Right-hand side of a comparison: the compare-input source sampled at
    /// the same offset as the left side, else the literal, else 0.
    fn compare_operand(
        &mut self,
        node: &Node,
        condition: &ConditionSpec,
        offset: usize,
    ) -> Result<Expression, GraphError> {
        let graph = self.graph;
        if let Some(source) = graph.compare_input(&node.id) {
            if condition.compare_value.is_some() {
                self.warn(CompileWarning::UnusedCompareValue {
                    node: node.id.clone(),
                });
            }
            return self.resolve(source, offset);
        }
        match condition.compare_value {
            Some(value) => Ok(Expression::literal(value)),
            None => {
                self.warn(CompileWarning::MissingCompareOperand {
                    node: node.id.clone(),
                });
                Ok(Expression::literal(0.0))
            }
        }
    }
}
