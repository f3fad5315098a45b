//! Per-run state for the risk exit rules.

use crate::compiler::ExitRule;
use crate::domain::NodeId;
use crate::graph::ExitKind;
use crate::indicators::IndicatorSpec;

/// Why an open position should be closed this bar.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitSignal {
    pub rule: NodeId,
    pub kind: ExitKind,
    /// Threshold the close breached.
    pub level: f64,
}

/// Entry price plus one ratchet level per trailing-stop rule.
///
/// Borrows the rules from a compiled strategy; every run owns its own
/// `ExitState`, so the strategy itself stays shareable.
#[derive(Debug, Clone)]
pub struct ExitState<'s> {
    rules: &'s [ExitRule],
    entry_price: Option<f64>,
    /// Parallel to `rules`; only trailing rules ever hold a level.
    trailing: Vec<Option<f64>>,
}

impl<'s> ExitState<'s> {
    pub fn new(rules: &'s [ExitRule]) -> Self {
        Self {
            rules,
            entry_price: None,
            trailing: vec![None; rules.len()],
        }
    }

    pub fn is_open(&self) -> bool {
        self.entry_price.is_some()
    }

    pub fn entry_price(&self) -> Option<f64> {
        self.entry_price
    }

    /// Start tracking a new position. Trailing levels start unset.
    pub fn open(&mut self, entry_price: f64) {
        self.entry_price = Some(entry_price);
        self.trailing.iter_mut().for_each(|level| *level = None);
    }

    pub fn close(&mut self) {
        self.entry_price = None;
        self.trailing.iter_mut().for_each(|level| *level = None);
    }

    /// Current ratchet level of a trailing rule.
    pub fn trailing_level(&self, rule: &NodeId) -> Option<f64> {
        self.rules
            .iter()
            .position(|r| &r.node == rule)
            .and_then(|i| self.trailing[i])
    }

    /// Evaluate every rule in order against the bar's close; the first one
    /// that triggers wins. Does not close the state itself.
    ///
    /// `atr` looks up the latest value of an ATR series. An ATR-based rule
    /// with no value available holds (neither triggers nor moves).
    pub fn on_bar(
        &mut self,
        close: f64,
        atr: impl Fn(&IndicatorSpec) -> Option<f64>,
    ) -> Option<ExitSignal> {
        let entry = self.entry_price?;
        if close.is_nan() {
            return None;
        }

        let rules = self.rules;
        for (i, rule) in rules.iter().enumerate() {
            let atr_value = rule.atr.as_ref().and_then(&atr);
            if rule.atr.is_some() && atr_value.is_none() {
                continue;
            }
            let level = match rule.kind {
                ExitKind::StopLoss | ExitKind::TakeProfit => rule.level(entry, atr_value),
                ExitKind::TrailingStop => {
                    // Ratchet: the stored level only ever moves up.
                    if let Some(candidate) = rule.level(close, atr_value) {
                        let stored = &mut self.trailing[i];
                        if stored.map_or(true, |s| candidate > s) {
                            *stored = Some(candidate);
                        }
                    }
                    self.trailing[i]
                }
            };

            if let Some(level) = level {
                if rule.is_breached(close, level) {
                    return Some(ExitSignal {
                        rule: rule.node.clone(),
                        kind: rule.kind,
                        level,
                    });
                }
            }
        }
        None
    }
}
