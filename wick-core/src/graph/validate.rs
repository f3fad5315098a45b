//! Structural validation: `Graph` in, `ValidatedGraph` or `GraphError` out.
//!
//! Checks run in a fixed order and the first failure is returned, so the
//! same invalid graph always reports the same error.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::domain::NodeId;
use crate::indicators::{check_param, IndicatorKind};

use super::error::GraphError;
use super::node::{
    ExitBasis, ExitKind, LogicOp, Node, NodeKind, SizingMode, MAX_LOOKBACK, MAX_OFFSET,
};
use super::{EdgeRole, Graph};

/// A graph that passed every structural check, with adjacency precomputed.
///
/// Owns its own copy of the graph: later edits to the editor model can never
/// leak into a compilation in progress.
#[derive(Debug, Clone)]
pub struct ValidatedGraph {
    graph: Graph,
    index: HashMap<NodeId, usize>,
    /// Flow parents per node, in edge order.
    flow_parents: HashMap<NodeId, Vec<NodeId>>,
    compare_inputs: HashMap<NodeId, NodeId>,
    /// Nodes that feed at least one action, directly or transitively.
    reachable: HashSet<NodeId>,
}

impl ValidatedGraph {
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn nodes(&self) -> &[Node] {
        &self.graph.nodes
    }

    pub fn node(&self, id: &NodeId) -> Result<&Node, GraphError> {
        self.index
            .get(id)
            .map(|&i| &self.graph.nodes[i])
            .ok_or_else(|| GraphError::UnknownNode(id.clone()))
    }

    /// Sources of inbound `Flow` edges, in edge order.
    pub fn flow_parents(&self, id: &NodeId) -> &[NodeId] {
        self.flow_parents
            .get(id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Source of the inbound `CompareInput` edge, if any.
    pub fn compare_input(&self, id: &NodeId) -> Option<&NodeId> {
        self.compare_inputs.get(id)
    }

    /// Action nodes in node order.
    pub fn actions(&self) -> impl Iterator<Item = &Node> {
        self.graph.nodes.iter().filter(|n| n.is_action())
    }

    /// Exit nodes in node order.
    pub fn exits(&self) -> impl Iterator<Item = &Node> {
        self.graph.nodes.iter().filter(|n| n.is_exit())
    }

    /// True if the node feeds some action through flow or compare edges.
    pub fn is_reachable(&self, id: &NodeId) -> bool {
        self.reachable.contains(id)
    }
}

/// Validate a graph snapshot.
///
/// Order of checks: duplicate ids, missing actions, dangling edges, edge role
/// compatibility, duplicate compare inputs, flow cycles reachable from an
/// action, NOT arity, then per-node parameters.
pub fn validate(graph: &Graph) -> Result<ValidatedGraph, GraphError> {
    let mut index = HashMap::with_capacity(graph.nodes.len());
    for (i, node) in graph.nodes.iter().enumerate() {
        if index.insert(node.id.clone(), i).is_some() {
            return Err(GraphError::DuplicateNode(node.id.clone()));
        }
    }

    if !graph.nodes.iter().any(Node::is_action) {
        return Err(GraphError::NoActionNodes);
    }

    for edge in &graph.edges {
        if !index.contains_key(&edge.source) || !index.contains_key(&edge.target) {
            return Err(GraphError::DanglingEdge(edge.id.clone()));
        }
    }

    let mut flow_parents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    let mut compare_inputs: HashMap<NodeId, NodeId> = HashMap::new();

    for edge in &graph.edges {
        let source = &graph.nodes[index[&edge.source]];
        let target = &graph.nodes[index[&edge.target]];
        check_edge_roles(edge.role, source, target).map_err(|reason| {
            GraphError::InvalidEdge {
                edge: edge.id.clone(),
                reason,
            }
        })?;

        match edge.role {
            EdgeRole::Flow => flow_parents
                .entry(edge.target.clone())
                .or_default()
                .push(edge.source.clone()),
            EdgeRole::CompareInput => {
                if compare_inputs
                    .insert(edge.target.clone(), edge.source.clone())
                    .is_some()
                {
                    return Err(GraphError::DuplicateCompareInput(edge.target.clone()));
                }
            }
        }
    }

    detect_cycles(graph, &flow_parents)?;

    for node in &graph.nodes {
        if let NodeKind::Logic { op: LogicOp::Not } = node.kind {
            let inputs = flow_parents.get(&node.id).map_or(0, Vec::len);
            if inputs != 1 {
                return Err(GraphError::NotArity {
                    node: node.id.clone(),
                    inputs,
                });
            }
        }
    }

    for node in &graph.nodes {
        check_node(node)?;
    }

    let reachable = reachable_from_actions(graph, &flow_parents, &compare_inputs);

    Ok(ValidatedGraph {
        graph: graph.clone(),
        index,
        flow_parents,
        compare_inputs,
        reachable,
    })
}

fn check_edge_roles(role: EdgeRole, source: &Node, target: &Node) -> Result<(), String> {
    if source.is_exit() || target.is_exit() {
        return Err("exit nodes take no edges".into());
    }
    match role {
        EdgeRole::Flow => {
            if source.is_action() {
                return Err(format!("action node {} has no output", source.id));
            }
            Ok(())
        }
        EdgeRole::CompareInput => {
            if !source.is_condition() {
                return Err(format!(
                    "compare input source {} is a {} node, expected price, indicator or value",
                    source.id,
                    source.kind_name()
                ));
            }
            if !target.is_condition() {
                return Err(format!(
                    "compare input target {} is a {} node, expected price, indicator or value",
                    target.id,
                    target.kind_name()
                ));
            }
            Ok(())
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Depth-first search backwards from every action along flow edges.
///
/// Only cycles among an action's predecessors are errors; a cycle in a
/// disconnected fragment never reaches the compiler.
fn detect_cycles(
    graph: &Graph,
    flow_parents: &HashMap<NodeId, Vec<NodeId>>,
) -> Result<(), GraphError> {
    fn visit<'a>(
        id: &'a NodeId,
        flow_parents: &'a HashMap<NodeId, Vec<NodeId>>,
        marks: &mut HashMap<&'a NodeId, Mark>,
    ) -> Result<(), GraphError> {
        match marks.get(id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => return Err(GraphError::CycleDetected(id.clone())),
            None => {}
        }
        marks.insert(id, Mark::InProgress);
        if let Some(parents) = flow_parents.get(id) {
            for parent in parents {
                visit(parent, flow_parents, marks)?;
            }
        }
        marks.insert(id, Mark::Done);
        Ok(())
    }

    let mut marks = HashMap::new();
    for action in graph.nodes.iter().filter(|n| n.is_action()) {
        visit(&action.id, flow_parents, &mut marks)?;
    }
    Ok(())
}

/// Nodes whose predicate or value an action can observe.
///
/// Flow parents are followed transitively. A compare-input source is only
/// read for its value, so its own flow parents are not.
fn reachable_from_actions(
    graph: &Graph,
    flow_parents: &HashMap<NodeId, Vec<NodeId>>,
    compare_inputs: &HashMap<NodeId, NodeId>,
) -> HashSet<NodeId> {
    let mut seen = HashSet::new();
    let mut queue: VecDeque<&NodeId> = graph
        .nodes
        .iter()
        .filter(|n| n.is_action())
        .map(|n| &n.id)
        .collect();

    while let Some(id) = queue.pop_front() {
        if !seen.insert(id.clone()) {
            continue;
        }
        if let Some(parents) = flow_parents.get(id) {
            queue.extend(parents.iter());
        }
    }

    let sources: Vec<NodeId> = seen
        .iter()
        .filter_map(|id| compare_inputs.get(id).cloned())
        .collect();
    seen.extend(sources);
    seen
}

fn check_node(node: &Node) -> Result<(), GraphError> {
    let invalid_param = |param: &str, reason: &str| GraphError::InvalidParameter {
        node: node.id.clone(),
        param: param.to_string(),
        reason: reason.to_string(),
    };

    if let Some(condition) = node.condition() {
        if condition.offset > MAX_OFFSET {
            return Err(invalid_param(
                "offset",
                &format!("must be at most {MAX_OFFSET}, got {}", condition.offset),
            ));
        }
        if condition.lookback > MAX_LOOKBACK {
            return Err(invalid_param(
                "lookback",
                &format!("must be at most {MAX_LOOKBACK}, got {}", condition.lookback),
            ));
        }
        if let Some(value) = condition.compare_value {
            if !value.is_finite() {
                return Err(invalid_param("compare_value", "must be a finite number"));
            }
        }
    }

    match &node.kind {
        NodeKind::Value { value, .. } if !value.is_finite() => {
            Err(invalid_param("value", "must be a finite number"))
        }
        NodeKind::Indicator {
            indicator, params, ..
        } => check_indicator_params(node, *indicator, params),
        NodeKind::Action { sizing, amount, .. } => check_sizing(node, *sizing, *amount),
        NodeKind::Exit {
            exit,
            basis,
            magnitude,
            atr_period,
        } => check_exit(node, *exit, *basis, *magnitude, *atr_period),
        _ => Ok(()),
    }
}

fn check_indicator_params(
    node: &Node,
    indicator: IndicatorKind,
    params: &std::collections::BTreeMap<String, f64>,
) -> Result<(), GraphError> {
    for def in indicator.params() {
        if let Some(&value) = params.get(def.name) {
            check_param(def, value).map_err(|e| GraphError::InvalidParameter {
                node: node.id.clone(),
                param: e.param,
                reason: e.reason.to_string(),
            })?;
        }
    }
    Ok(())
}

fn check_sizing(node: &Node, sizing: SizingMode, amount: Option<f64>) -> Result<(), GraphError> {
    let invalid = |reason: String| {
        Err(GraphError::InvalidSizing {
            node: node.id.clone(),
            reason,
        })
    };

    if sizing == SizingMode::AllAvailable {
        return Ok(());
    }
    let Some(amount) = amount else {
        return invalid(format!("{sizing:?} requires an amount"));
    };
    if !amount.is_finite() {
        return invalid("amount must be a finite number".into());
    }

    match sizing {
        SizingMode::FixedCash | SizingMode::FixedShares if amount <= 0.0 => {
            invalid(format!("{sizing:?} amount must be positive, got {amount}"))
        }
        SizingMode::PercentOfEquity if !(0.0..=100.0).contains(&amount) => invalid(format!(
            "percent of equity must be within [0, 100], got {amount}"
        )),
        _ => Ok(()),
    }
}

fn check_exit(
    node: &Node,
    exit: ExitKind,
    basis: ExitBasis,
    magnitude: f64,
    atr_period: Option<usize>,
) -> Result<(), GraphError> {
    let invalid = |reason: String| {
        Err(GraphError::InvalidExit {
            node: node.id.clone(),
            reason,
        })
    };

    if !magnitude.is_finite() || magnitude <= 0.0 {
        return invalid(format!("magnitude must be positive, got {magnitude}"));
    }
    // A stop 100% below the reference price can never be reached.
    if basis == ExitBasis::Percent
        && matches!(exit, ExitKind::StopLoss | ExitKind::TrailingStop)
        && magnitude >= 100.0
    {
        return invalid(format!("{exit} percent must be below 100, got {magnitude}"));
    }
    if atr_period == Some(0) {
        return invalid("atr_period must be >= 1".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::{ActionSide, ConditionSpec, PriceField};
    use crate::graph::Edge;

    fn price(id: &str) -> Node {
        Node::new(
            id,
            NodeKind::Price {
                field: PriceField::Close,
                condition: ConditionSpec::default(),
            },
        )
    }

    fn logic(id: &str, op: LogicOp) -> Node {
        Node::new(id, NodeKind::Logic { op })
    }

    fn buy(id: &str) -> Node {
        Node::new(
            id,
            NodeKind::Action {
                side: ActionSide::Buy,
                sizing: SizingMode::AllAvailable,
                amount: None,
            },
        )
    }

    #[test]
    fn minimal_graph_validates() {
        let graph = Graph::new(vec![price("p"), buy("b")], vec![Edge::flow("e", "p", "b")]);
        let validated = validate(&graph).unwrap();
        assert_eq!(validated.flow_parents(&"b".into()), &[NodeId::new("p")]);
        assert!(validated.is_reachable(&"p".into()));
        assert_eq!(validated.actions().count(), 1);
    }

    #[test]
    fn duplicate_node_id_is_rejected() {
        let graph = Graph::new(vec![price("p"), price("p"), buy("b")], vec![]);
        assert_eq!(
            validate(&graph).unwrap_err(),
            GraphError::DuplicateNode("p".into())
        );
    }

    #[test]
    fn flow_self_loop_is_a_cycle() {
        let graph = Graph::new(
            vec![logic("and", LogicOp::And), buy("b")],
            vec![Edge::flow("loop", "and", "and"), Edge::flow("e", "and", "b")],
        );
        assert_eq!(
            validate(&graph).unwrap_err(),
            GraphError::CycleDetected("and".into())
        );
    }

    #[test]
    fn cycle_outside_action_predecessors_is_tolerated() {
        let graph = Graph::new(
            vec![price("p"), logic("x", LogicOp::Or), logic("y", LogicOp::Or), buy("b")],
            vec![
                Edge::flow("e1", "p", "b"),
                Edge::flow("e2", "x", "y"),
                Edge::flow("e3", "y", "x"),
            ],
        );
        let validated = validate(&graph).unwrap();
        assert!(!validated.is_reachable(&"x".into()));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let graph = Graph::new(
            vec![
                price("p"),
                logic("a", LogicOp::And),
                logic("o", LogicOp::Or),
                logic("top", LogicOp::And),
                buy("b"),
            ],
            vec![
                Edge::flow("e1", "p", "a"),
                Edge::flow("e2", "p", "o"),
                Edge::flow("e3", "a", "top"),
                Edge::flow("e4", "o", "top"),
                Edge::flow("e5", "top", "b"),
            ],
        );
        assert!(validate(&graph).is_ok());
    }

    #[test]
    fn flow_out_of_action_is_invalid() {
        let graph = Graph::new(
            vec![buy("b1"), buy("b2")],
            vec![Edge::flow("e", "b1", "b2")],
        );
        assert!(matches!(
            validate(&graph).unwrap_err(),
            GraphError::InvalidEdge { .. }
        ));
    }

    #[test]
    fn compare_input_into_logic_is_invalid() {
        let graph = Graph::new(
            vec![price("p"), logic("a", LogicOp::And), buy("b")],
            vec![
                Edge::compare_input("c", "p", "a"),
                Edge::flow("e", "a", "b"),
            ],
        );
        assert!(matches!(
            validate(&graph).unwrap_err(),
            GraphError::InvalidEdge { .. }
        ));
    }

    #[test]
    fn percent_sizing_bounds() {
        for (amount, ok) in [(0.0, true), (100.0, true), (100.5, false), (-1.0, false)] {
            let graph = Graph::new(
                vec![Node::new(
                    "b",
                    NodeKind::Action {
                        side: ActionSide::Buy,
                        sizing: SizingMode::PercentOfEquity,
                        amount: Some(amount),
                    },
                )],
                vec![],
            );
            assert_eq!(validate(&graph).is_ok(), ok, "amount {amount}");
        }
    }

    #[test]
    fn fixed_cash_requires_amount() {
        let graph = Graph::new(
            vec![Node::new(
                "b",
                NodeKind::Action {
                    side: ActionSide::Buy,
                    sizing: SizingMode::FixedCash,
                    amount: None,
                },
            )],
            vec![],
        );
        assert!(matches!(
            validate(&graph).unwrap_err(),
            GraphError::InvalidSizing { .. }
        ));
    }

    #[test]
    fn stop_loss_percent_must_be_below_100() {
        let graph = Graph::new(
            vec![
                buy("b"),
                Node::new(
                    "sl",
                    NodeKind::Exit {
                        exit: ExitKind::StopLoss,
                        basis: ExitBasis::Percent,
                        magnitude: 100.0,
                        atr_period: None,
                    },
                ),
            ],
            vec![],
        );
        assert!(matches!(
            validate(&graph).unwrap_err(),
            GraphError::InvalidExit { .. }
        ));
    }

    #[test]
    fn take_profit_percent_may_exceed_100() {
        let graph = Graph::new(
            vec![
                buy("b"),
                Node::new(
                    "tp",
                    NodeKind::Exit {
                        exit: ExitKind::TakeProfit,
                        basis: ExitBasis::Percent,
                        magnitude: 150.0,
                        atr_period: None,
                    },
                ),
            ],
            vec![],
        );
        assert!(validate(&graph).is_ok());
        assert_eq!(validate(&graph).unwrap().exits().count(), 1);
    }
}
