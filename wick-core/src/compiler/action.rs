//! Action resolver: one `ActionRule` per Buy/Sell node.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::context::CompileContext;
use super::predicate::Predicate;
use super::warning::CompileWarning;
use crate::domain::{format_number, NodeId};
use crate::graph::{ActionSide, GraphError, Node, NodeKind, SizingMode};

/// Which position state a rule may fire in. Long-only: entries open a
/// position from flat, exits close it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Entry,
    Exit,
}

impl From<ActionSide> for Direction {
    fn from(side: ActionSide) -> Self {
        match side {
            ActionSide::Buy => Self::Entry,
            ActionSide::Sell => Self::Exit,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entry => f.write_str("entry"),
            Self::Exit => f.write_str("exit"),
        }
    }
}

/// Resolved position sizing. Conversion to a share count happens at
/// execution time against the bar's price and the account's equity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Sizing {
    AllAvailable,
    FixedCash { amount: f64 },
    FixedShares { shares: f64 },
    /// Percentage of current equity, in [0, 100].
    PercentOfEquity { percent: f64 },
}

impl fmt::Display for Sizing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllAvailable => f.write_str("all available"),
            Self::FixedCash { amount } => write!(f, "cash {}", format_number(*amount)),
            Self::FixedShares { shares } => write!(f, "{} shares", format_number(*shares)),
            Self::PercentOfEquity { percent } => {
                write!(f, "{}% of equity", format_number(*percent))
            }
        }
    }
}

/// Compiled Buy/Sell node: fire `sizing` when `predicate` holds and the
/// position state matches `direction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRule {
    pub node: NodeId,
    pub side: ActionSide,
    pub direction: Direction,
    pub predicate: Predicate,
    pub sizing: Sizing,
}

impl fmt::Display for ActionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self.side {
            ActionSide::Buy => "buy",
            ActionSide::Sell => "sell",
        };
        write!(
            f,
            "{} ({side}, {}, {}): {}",
            self.node, self.direction, self.sizing, self.predicate
        )
    }
}

impl CompileContext<'_> {
    /// Several direct flow parents are an implicit AND; none means the rule
    /// fires on every bar it is eligible.
    pub(crate) fn compile_action(&mut self, node: &Node) -> Result<ActionRule, GraphError> {
        let NodeKind::Action {
            side,
            sizing,
            amount,
        } = &node.kind
        else {
            return Err(GraphError::UnexpectedNodeKind {
                node: node.id.clone(),
                found: node.kind_name(),
                expected: "an action",
            });
        };

        let graph = self.graph;
        let parents = graph.flow_parents(&node.id);
        if parents.is_empty() {
            self.warn(CompileWarning::UngatedAction {
                node: node.id.clone(),
            });
        }
        let predicate = Predicate::all(self.compile_parents(parents, &mut HashSet::new())?);
        let sizing = self.resolve_sizing(node, *sizing, *amount)?;

        Ok(ActionRule {
            node: node.id.clone(),
            side: *side,
            direction: Direction::from(*side),
            predicate,
            sizing,
        })
    }

    fn resolve_sizing(
        &mut self,
        node: &Node,
        mode: SizingMode,
        amount: Option<f64>,
    ) -> Result<Sizing, GraphError> {
        if mode == SizingMode::AllAvailable {
            if amount.is_some() {
                self.warn(CompileWarning::IgnoredAmount {
                    node: node.id.clone(),
                });
            }
            return Ok(Sizing::AllAvailable);
        }
        let amount = amount.ok_or_else(|| GraphError::InvalidSizing {
            node: node.id.clone(),
            reason: "amount is required".into(),
        })?;
        Ok(match mode {
            SizingMode::FixedCash => Sizing::FixedCash { amount },
            SizingMode::FixedShares => Sizing::FixedShares { shares: amount },
            SizingMode::PercentOfEquity => Sizing::PercentOfEquity { percent: amount },
            SizingMode::AllAvailable => Sizing::AllAvailable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::graph::{validate, Comparison, ConditionSpec, Edge, Graph, PriceField};

    fn action(id: &str, side: ActionSide, sizing: SizingMode, amount: Option<f64>) -> Node {
        Node::new(
            id,
            NodeKind::Action {
                side,
                sizing,
                amount,
            },
        )
    }

    fn close(id: &str, value: f64) -> Node {
        Node::new(
            id,
            NodeKind::Price {
                field: PriceField::Close,
                condition: ConditionSpec {
                    comparison: Comparison::Gt,
                    compare_value: Some(value),
                    ..ConditionSpec::default()
                },
            },
        )
    }

    fn compile_actions(graph: Graph) -> (Vec<ActionRule>, Vec<CompileWarning>) {
        let validated = validate(&graph).unwrap();
        let config = CompilerConfig::default();
        let mut ctx = CompileContext::new(&validated, &config);
        let rules = validated
            .actions()
            .map(|n| ctx.compile_action(n))
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        let (_, warnings) = ctx.into_parts();
        (rules, warnings)
    }

    #[test]
    fn multiple_parents_are_conjoined() {
        let (rules, _) = compile_actions(Graph::new(
            vec![
                close("a", 1.0),
                close("b", 2.0),
                action("buy", ActionSide::Buy, SizingMode::FixedCash, Some(1000.0)),
            ],
            vec![Edge::flow("e1", "a", "buy"), Edge::flow("e2", "b", "buy")],
        ));
        assert_eq!(rules.len(), 1);
        assert_eq!(
            rules[0].predicate.to_string(),
            "(Close[-1] > 1 and Close[-1] > 2)"
        );
        assert_eq!(rules[0].sizing, Sizing::FixedCash { amount: 1000.0 });
        assert_eq!(rules[0].direction, Direction::Entry);
    }

    #[test]
    fn sell_is_exit_direction() {
        let (rules, _) = compile_actions(Graph::new(
            vec![
                close("a", 1.0),
                action("sell", ActionSide::Sell, SizingMode::PercentOfEquity, Some(50.0)),
            ],
            vec![Edge::flow("e1", "a", "sell")],
        ));
        assert_eq!(rules[0].direction, Direction::Exit);
        assert_eq!(rules[0].sizing, Sizing::PercentOfEquity { percent: 50.0 });
        assert_eq!(
            rules[0].to_string(),
            "sell (sell, exit, 50% of equity): Close[-1] > 1"
        );
    }

    #[test]
    fn ungated_action_warns_and_always_fires() {
        let (rules, warnings) = compile_actions(Graph::new(
            vec![action("buy", ActionSide::Buy, SizingMode::AllAvailable, Some(5.0))],
            vec![],
        ));
        assert_eq!(rules[0].predicate, Predicate::Always);
        assert_eq!(
            warnings,
            vec![
                CompileWarning::UngatedAction {
                    node: NodeId::new("buy")
                },
                CompileWarning::IgnoredAmount {
                    node: NodeId::new("buy")
                },
            ]
        );
    }

    #[test]
    fn sizing_display() {
        assert_eq!(Sizing::AllAvailable.to_string(), "all available");
        assert_eq!(Sizing::FixedShares { shares: 10.0 }.to_string(), "10 shares");
        assert_eq!(Sizing::FixedCash { amount: 2500.5 }.to_string(), "cash 2500.5");
    }
}
