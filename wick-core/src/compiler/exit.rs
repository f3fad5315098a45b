//! Risk exit rules, compiled independently of the condition graph.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::context::CompileContext;
use super::warning::CompileWarning;
use crate::domain::{format_number, NodeId};
use crate::graph::{ExitBasis, ExitKind, GraphError, Node, NodeKind};
use crate::indicators::IndicatorSpec;

/// A position-scoped stop-loss, take-profit or trailing stop.
///
/// Thresholds are computed from a reference price: the entry price for fixed
/// stops and targets, the current close for a trailing stop candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitRule {
    pub node: NodeId,
    pub kind: ExitKind,
    pub basis: ExitBasis,
    pub magnitude: f64,
    /// ATR series the rule reads (AtrMultiple basis only).
    pub atr: Option<IndicatorSpec>,
}

impl ExitRule {
    pub fn is_trailing(&self) -> bool {
        self.kind == ExitKind::TrailingStop
    }

    /// Distance from the reference price to the threshold.
    ///
    /// `None` when the rule needs an ATR value and none is available yet.
    pub fn distance(&self, reference: f64, atr: Option<f64>) -> Option<f64> {
        match self.basis {
            ExitBasis::Percent => Some(reference * self.magnitude / 100.0),
            ExitBasis::FixedAmount => Some(self.magnitude),
            ExitBasis::AtrMultiple => atr
                .filter(|a| a.is_finite())
                .map(|a| self.magnitude * a),
        }
    }

    /// Threshold price for a given reference: below it for stops, above it
    /// for take-profit.
    pub fn level(&self, reference: f64, atr: Option<f64>) -> Option<f64> {
        let distance = self.distance(reference, atr)?;
        Some(match self.kind {
            ExitKind::StopLoss | ExitKind::TrailingStop => reference - distance,
            ExitKind::TakeProfit => reference + distance,
        })
    }

    /// True when `close` is on the closing side of `level`.
    pub fn is_breached(&self, close: f64, level: f64) -> bool {
        match self.kind {
            ExitKind::StopLoss | ExitKind::TrailingStop => close <= level,
            ExitKind::TakeProfit => close >= level,
        }
    }

    /// Threshold formula in terms of `reference` (`entry_price`, `close`).
    pub fn formula(&self, reference: &str) -> String {
        let sign = match self.kind {
            ExitKind::StopLoss | ExitKind::TrailingStop => '-',
            ExitKind::TakeProfit => '+',
        };
        let magnitude = format_number(self.magnitude);
        match (&self.basis, &self.atr) {
            (ExitBasis::Percent, _) => {
                format!("{reference} * (1 {sign} {magnitude}/100)")
            }
            (ExitBasis::AtrMultiple, Some(atr)) => {
                format!("{reference} {sign} {magnitude} * {atr}[-1]")
            }
            _ => format!("{reference} {sign} {magnitude}"),
        }
    }
}

impl fmt::Display for ExitRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ExitKind::StopLoss => write!(
                f,
                "{} ({}): close <= {}",
                self.node,
                self.kind,
                self.formula("entry_price")
            ),
            ExitKind::TakeProfit => write!(
                f,
                "{} ({}): close >= {}",
                self.node,
                self.kind,
                self.formula("entry_price")
            ),
            ExitKind::TrailingStop => write!(
                f,
                "{} ({}): close <= highest({})",
                self.node,
                self.kind,
                self.formula("close")
            ),
        }
    }
}

impl CompileContext<'_> {
    pub(crate) fn compile_exit(&mut self, node: &Node) -> Result<ExitRule, GraphError> {
        let NodeKind::Exit {
            exit,
            basis,
            magnitude,
            atr_period,
        } = &node.kind
        else {
            return Err(GraphError::UnexpectedNodeKind {
                node: node.id.clone(),
                found: node.kind_name(),
                expected: "an exit",
            });
        };

        let atr = if *basis == ExitBasis::AtrMultiple {
            let period = match atr_period {
                Some(period) => *period,
                None => {
                    let period = self.config.default_atr_period;
                    self.warn(CompileWarning::DefaultAtrPeriod {
                        node: node.id.clone(),
                        period,
                    });
                    period
                }
            };
            let spec = IndicatorSpec::atr(period);
            self.require(&spec);
            Some(spec)
        } else {
            if atr_period.is_some() {
                self.warn(CompileWarning::IgnoredAtrPeriod {
                    node: node.id.clone(),
                });
            }
            None
        };

        Ok(ExitRule {
            node: node.id.clone(),
            kind: *exit,
            basis: *basis,
            magnitude: *magnitude,
            atr,
        })
    }
}
