//! Bar-by-bar interpretation of a compiled strategy.

use serde::Serialize;
use tracing::debug;

use super::exits::ExitState;
use super::series::{SeriesError, SeriesSet};
use crate::compiler::{CompiledStrategy, Direction};
use crate::domain::NodeId;
use crate::graph::PriceField;
use crate::indicators::IndicatorSpec;

/// What the strategy wants done at the close of a bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Hold,
    /// An entry rule fired while flat.
    Enter { rule: NodeId },
    /// An exit rule fired while holding.
    Exit { rule: NodeId },
    /// A risk exit rule closed the position.
    RiskExit { rule: NodeId },
}

impl Decision {
    pub fn is_hold(&self) -> bool {
        matches!(self, Self::Hold)
    }
}

/// Per-run state over one compiled strategy: flat or holding, entry price,
/// trailing levels. Independent sessions over the same strategy share nothing.
#[derive(Debug, Clone)]
pub struct Session<'s> {
    strategy: &'s CompiledStrategy,
    exits: ExitState<'s>,
    warmup: usize,
}

impl<'s> Session<'s> {
    pub fn new(strategy: &'s CompiledStrategy) -> Self {
        Self {
            strategy,
            exits: ExitState::new(strategy.exits()),
            warmup: strategy.history_required(),
        }
    }

    pub fn is_holding(&self) -> bool {
        self.exits.is_open()
    }

    pub fn entry_price(&self) -> Option<f64> {
        self.exits.entry_price()
    }

    pub fn exit_state(&self) -> &ExitState<'s> {
        &self.exits
    }

    /// Decide at bar `t`, the most recently closed bar.
    ///
    /// Holding: risk exits first, then exit rules in node order. Flat: entry
    /// rules in node order, filled at the close of `t`. First rule to fire wins.
    pub fn on_bar(&mut self, series: &SeriesSet, t: usize) -> Decision {
        if t + 1 < self.warmup {
            return Decision::Hold;
        }
        let close = series
            .get(PriceField::Close.key(), t)
            .filter(|c| c.is_finite());

        if self.exits.is_open() {
            if let Some(close) = close {
                let atr = |spec: &IndicatorSpec| {
                    series.get(&spec.key(), t).filter(|v| !v.is_nan())
                };
                if let Some(signal) = self.exits.on_bar(close, atr) {
                    debug!(
                        rule = %signal.rule,
                        kind = %signal.kind,
                        level = signal.level,
                        close,
                        bar = t,
                        "risk exit triggered"
                    );
                    self.exits.close();
                    return Decision::RiskExit { rule: signal.rule };
                }
            }
            return match self.first_exit(series, t) {
                Some(rule) => {
                    self.exits.close();
                    Decision::Exit { rule }
                }
                None => Decision::Hold,
            };
        }

        let Some(close) = close else {
            return Decision::Hold;
        };
        match self.first_entry(series, t, close) {
            Some(rule) => {
                self.exits.open(close);
                Decision::Enter { rule }
            }
            None => Decision::Hold,
        }
    }

    /// Entry rules that fire but size to nothing at this close are skipped,
    /// so a later entry rule still gets its turn.
    fn first_entry(&self, series: &SeriesSet, t: usize, close: f64) -> Option<NodeId> {
        self.strategy
            .actions()
            .iter()
            .filter(|rule| rule.direction == Direction::Entry && rule.sizing.opens_at(close))
            .find(|rule| rule.predicate.evaluate(series, t))
            .map(|rule| rule.node.clone())
    }

    fn first_exit(&self, series: &SeriesSet, t: usize) -> Option<NodeId> {
        self.strategy
            .actions()
            .iter()
            .filter(|rule| rule.direction == Direction::Exit)
            .find(|rule| rule.predicate.evaluate(series, t))
            .map(|rule| rule.node.clone())
    }
}

/// Run a fresh session over every bar; one decision per bar.
pub fn replay(
    strategy: &CompiledStrategy,
    series: &SeriesSet,
) -> Result<Vec<Decision>, SeriesError> {
    series.check_requirements(strategy)?;
    let mut session = Session::new(strategy);
    Ok((0..series.bar_count())
        .map(|t| session.on_bar(series, t))
        .collect())
}
