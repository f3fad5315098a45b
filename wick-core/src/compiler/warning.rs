//! Non-fatal compiler diagnostics.

use std::fmt;

use serde::Serialize;

use crate::domain::{format_number, NodeId};
use crate::indicators::IndicatorKind;

/// Something the compiler accepted but the author may not have meant.
///
/// Warnings are recorded in discovery order and are a pure function of the
/// graph and config. In strict mode they become `CompileError::WarningsAsErrors`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum CompileWarning {
    /// An indicator parameter was absent and filled from a default.
    DefaultParameter {
        node: NodeId,
        indicator: IndicatorKind,
        param: String,
        value: f64,
    },
    /// A supplied parameter name the indicator does not define.
    UnknownParameter { node: NodeId, param: String },
    /// No compare-input edge and no literal; compared against 0.
    MissingCompareOperand { node: NodeId },
    /// Action with no flow input fires whenever it is eligible.
    UngatedAction { node: NodeId },
    /// `all_available` sizing ignores the amount given.
    IgnoredAmount { node: NodeId },
    /// ATR-based exit without an explicit period.
    DefaultAtrPeriod { node: NodeId, period: usize },
    /// `atr_period` on a percent or fixed-amount exit has no effect.
    IgnoredAtrPeriod { node: NodeId },
    /// Literal compare value overridden by a compare-input edge.
    UnusedCompareValue { node: NodeId },
    /// Condition or logic node that feeds no action.
    UnreachableNode { node: NodeId },
}

impl CompileWarning {
    pub fn node(&self) -> &NodeId {
        match self {
            Self::DefaultParameter { node, .. }
            | Self::UnknownParameter { node, .. }
            | Self::MissingCompareOperand { node }
            | Self::UngatedAction { node }
            | Self::IgnoredAmount { node }
            | Self::DefaultAtrPeriod { node, .. }
            | Self::IgnoredAtrPeriod { node }
            | Self::UnusedCompareValue { node }
            | Self::UnreachableNode { node } => node,
        }
    }
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DefaultParameter {
                node,
                indicator,
                param,
                value,
            } => write!(
                f,
                "{node}: {indicator} parameter `{param}` not set, using {}",
                format_number(*value)
            ),
            Self::UnknownParameter { node, param } => {
                write!(f, "{node}: unknown parameter `{param}` ignored")
            }
            Self::MissingCompareOperand { node } => {
                write!(f, "{node}: no compare value or compare input, comparing against 0")
            }
            Self::UngatedAction { node } => {
                write!(f, "{node}: action has no input and fires on every eligible bar")
            }
            Self::IgnoredAmount { node } => {
                write!(f, "{node}: amount is ignored for all_available sizing")
            }
            Self::DefaultAtrPeriod { node, period } => {
                write!(f, "{node}: ATR period not set, using {period}")
            }
            Self::IgnoredAtrPeriod { node } => {
                write!(f, "{node}: atr_period is ignored unless the basis is atr_multiple")
            }
            Self::UnusedCompareValue { node } => {
                write!(f, "{node}: compare value overridden by compare input")
            }
            Self::UnreachableNode { node } => write!(f, "{node}: node does not feed any action"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_node() {
        let w = CompileWarning::DefaultParameter {
            node: NodeId::new("rsi"),
            indicator: IndicatorKind::Rsi,
            param: "period".into(),
            value: 14.0,
        };
        assert_eq!(w.to_string(), "rsi: rsi parameter `period` not set, using 14");
        assert_eq!(w.node().as_str(), "rsi");
    }

    #[test]
    fn serializes_with_tag() {
        let w = CompileWarning::UngatedAction {
            node: NodeId::new("buy"),
        };
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, r#"{"warning":"ungated_action","node":"buy"}"#);
    }
}
