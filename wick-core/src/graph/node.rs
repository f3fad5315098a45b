//! Node vocabulary: one closed variant per node kind.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::NodeId;
use crate::indicators::IndicatorKind;

/// Price series a Price node reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl PriceField {
    pub const ALL: [PriceField; 5] = [
        Self::Open,
        Self::High,
        Self::Low,
        Self::Close,
        Self::Volume,
    ];

    /// Series key (`close`).
    pub fn key(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::High => "high",
            Self::Low => "low",
            Self::Close => "close",
            Self::Volume => "volume",
        }
    }

    /// Label used in rendered predicates (`Close`).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::High => "High",
            Self::Low => "Low",
            Self::Close => "Close",
            Self::Volume => "Volume",
        }
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Comparison operator carried by Price/Indicator/Value nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Comparison {
    #[default]
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "crosses_above", alias = "CrossesAbove")]
    CrossesAbove,
    #[serde(rename = "crosses_below", alias = "CrossesBelow")]
    CrossesBelow,
}

impl Comparison {
    /// True for the two operators that compare the previous bar as well.
    pub fn is_crossover(&self) -> bool {
        matches!(self, Self::CrossesAbove | Self::CrossesBelow)
    }
}

/// Largest accepted bar offset.
pub const MAX_OFFSET: usize = 10_000;
/// Largest accepted lookback window.
pub const MAX_LOOKBACK: usize = 10_000;

/// Condition fields shared by Price, Indicator and Value nodes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionSpec {
    #[serde(default)]
    pub comparison: Comparison,
    /// Literal compare operand; overridden by an inbound `CompareInput` edge.
    #[serde(default)]
    pub compare_value: Option<f64>,
    /// Bars into the past (0 = most recently closed bar).
    #[serde(default)]
    pub offset: usize,
    /// 0 = exact bar; N > 0 = satisfied on any of the last N bars.
    #[serde(default)]
    pub lookback: usize,
}

/// Boolean gate operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicOp {
    And,
    Or,
    Not,
}

/// Order side of an Action node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSide {
    Buy,
    Sell,
}

/// How an Action node sizes its order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingMode {
    AllAvailable,
    FixedCash,
    FixedShares,
    PercentOfEquity,
}

/// Risk exit flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitKind {
    StopLoss,
    TakeProfit,
    TrailingStop,
}

impl fmt::Display for ExitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StopLoss => "stop loss",
            Self::TakeProfit => "take profit",
            Self::TrailingStop => "trailing stop",
        })
    }
}

/// Unit of an exit's magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitBasis {
    Percent,
    FixedAmount,
    AtrMultiple,
}

/// Kind-specific node data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    Price {
        field: PriceField,
        #[serde(default)]
        condition: ConditionSpec,
    },
    Indicator {
        indicator: IndicatorKind,
        #[serde(default)]
        params: BTreeMap<String, f64>,
        #[serde(default)]
        condition: ConditionSpec,
    },
    Value {
        value: f64,
        #[serde(default)]
        condition: ConditionSpec,
    },
    Logic {
        op: LogicOp,
    },
    Action {
        side: ActionSide,
        sizing: SizingMode,
        #[serde(default)]
        amount: Option<f64>,
    },
    Exit {
        exit: ExitKind,
        basis: ExitBasis,
        magnitude: f64,
        #[serde(default)]
        atr_period: Option<usize>,
    },
}

/// A typed unit of the strategy graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    /// Condition fields, for the three kinds that carry them.
    pub fn condition(&self) -> Option<&ConditionSpec> {
        match &self.kind {
            NodeKind::Price { condition, .. }
            | NodeKind::Indicator { condition, .. }
            | NodeKind::Value { condition, .. } => Some(condition),
            NodeKind::Logic { .. } | NodeKind::Action { .. } | NodeKind::Exit { .. } => None,
        }
    }

    /// Price, Indicator and Value nodes produce a value and a comparison.
    pub fn is_condition(&self) -> bool {
        self.condition().is_some()
    }

    pub fn is_action(&self) -> bool {
        matches!(self.kind, NodeKind::Action { .. })
    }

    pub fn is_exit(&self) -> bool {
        matches!(self.kind, NodeKind::Exit { .. })
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            NodeKind::Price { .. } => "price",
            NodeKind::Indicator { .. } => "indicator",
            NodeKind::Value { .. } => "value",
            NodeKind::Logic { .. } => "logic",
            NodeKind::Action { .. } => "action",
            NodeKind::Exit { .. } => "exit",
        }
    }
}
