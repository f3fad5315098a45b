//! backtesting.py back-end.
//!
//! Emits a `Strategy` subclass the external runners `exec`. Indicators are
//! computed with TA-Lib through `self.I`, each bound to an attribute named by
//! its series key. Run state (entry price, trailing levels) lives on the
//! instance, so one generated class serves any number of backtests.

use std::fmt::Write;

use crate::compiler::{
    ActionRule, CompiledStrategy, Direction, ExitRule, Expression, Predicate, Sizing,
};
use crate::config::{CodegenConfig, ConfigError};
use crate::domain::format_number;
use crate::graph::{ExitBasis, ExitKind};
use crate::indicators::{IndicatorKind, IndicatorSpec};

const INDENT: &str = "    ";

pub fn generate(strategy: &CompiledStrategy, config: &CodegenConfig) -> Result<String, ConfigError> {
    config.check()?;
    let mut out = String::new();
    write_module(&mut out, strategy, config).expect("writing to a String never fails");
    Ok(out)
}

fn write_module(
    out: &mut String,
    strategy: &CompiledStrategy,
    config: &CodegenConfig,
) -> std::fmt::Result {
    writeln!(out, "import numpy as np")?;
    if !strategy.indicators().is_empty() {
        writeln!(out, "import talib")?;
    }
    writeln!(out, "from backtesting import Strategy")?;
    writeln!(out)?;
    writeln!(out)?;
    writeln!(out, "class {}(Strategy):", config.class_name)?;
    write_init(out, strategy)?;
    writeln!(out)?;
    write_next(out, strategy)?;
    writeln!(out)?;
    write_state_helpers(out, strategy)
}

fn write_init(out: &mut String, strategy: &CompiledStrategy) -> std::fmt::Result {
    writeln!(out, "{INDENT}def init(self):")?;
    writeln!(out, "{INDENT}{INDENT}self.entry_price = None")?;
    for (i, rule) in trailing_rules(strategy) {
        writeln!(out, "{INDENT}{INDENT}self.{} = None  # {:?}", trail_attr(i), rule.node.as_str())?;
    }
    for spec in strategy.indicators() {
        writeln!(out, "{INDENT}{INDENT}self.{} = {}", spec.key(), talib_indicator(spec))?;
    }
    Ok(())
}

fn write_next(out: &mut String, strategy: &CompiledStrategy) -> std::fmt::Result {
    let body = INDENT.repeat(2);
    let nested = INDENT.repeat(3);
    let inner = INDENT.repeat(4);

    writeln!(out, "{INDENT}def next(self):")?;
    let warmup = strategy.history_required();
    if warmup > 1 {
        writeln!(out, "{body}if len(self.data) < {warmup}:")?;
        writeln!(out, "{nested}return")?;
    }
    writeln!(out, "{body}close = self.data.Close[-1]")?;
    writeln!(out, "{body}if self.position:")?;

    for (i, rule) in strategy.exits().iter().enumerate() {
        writeln!(out, "{nested}# {} {:?}", rule.kind, rule.node.as_str())?;
        write_exit_check(out, i, rule, &nested, &inner)?;
        writeln!(out, "{inner}self.position.close()")?;
        writeln!(out, "{inner}self._flat()")?;
        writeln!(out, "{inner}return")?;
    }
    for rule in actions(strategy, Direction::Exit) {
        writeln!(out, "{nested}# {:?}", rule.node.as_str())?;
        writeln!(out, "{nested}if {}:", py_predicate(&rule.predicate))?;
        writeln!(out, "{inner}self.position.close()")?;
        writeln!(out, "{inner}self._flat()")?;
        writeln!(out, "{inner}return")?;
    }
    writeln!(out, "{nested}return")?;

    for rule in actions(strategy, Direction::Entry) {
        writeln!(out, "{body}# {:?}", rule.node.as_str())?;
        let Some(size_check) = entry_size_check(&rule.sizing) else {
            writeln!(out, "{body}# sizes to zero, never enters")?;
            continue;
        };
        writeln!(out, "{body}if {}{size_check}:", py_predicate(&rule.predicate))?;
        write_buy(out, &rule.sizing, &nested)?;
    }
    Ok(())
}

/// Opens an `if` whose body closes the position.
fn write_exit_check(
    out: &mut String,
    index: usize,
    rule: &ExitRule,
    indent: &str,
    inner: &str,
) -> std::fmt::Result {
    let atr = rule
        .atr
        .as_ref()
        .map(|spec| format!("self.{}[-1]", spec.key()));
    let guard = match &atr {
        Some(atr) => format!("not np.isnan({atr}) and "),
        None => String::new(),
    };

    match rule.kind {
        ExitKind::StopLoss | ExitKind::TakeProfit => {
            let cmp = if rule.kind == ExitKind::StopLoss { "<=" } else { ">=" };
            writeln!(
                out,
                "{indent}if {guard}close {cmp} {}:",
                py_level(rule, "self.entry_price", atr.as_deref())
            )
        }
        ExitKind::TrailingStop => {
            let attr = format!("self.{}", trail_attr(index));
            let candidate = py_level(rule, "close", atr.as_deref());
            match &atr {
                None => {
                    writeln!(out, "{indent}candidate = {candidate}")?;
                    writeln!(out, "{indent}if {attr} is None or candidate > {attr}:")?;
                    writeln!(out, "{inner}{attr} = candidate")?;
                }
                Some(atr) => {
                    writeln!(out, "{indent}if not np.isnan({atr}):")?;
                    writeln!(out, "{inner}candidate = {candidate}")?;
                    writeln!(out, "{inner}if {attr} is None or candidate > {attr}:")?;
                    writeln!(out, "{inner}{INDENT}{attr} = candidate")?;
                }
            }
            writeln!(out, "{indent}if {guard}{attr} is not None and close <= {attr}:")
        }
    }
}

fn py_level(rule: &ExitRule, reference: &str, atr: Option<&str>) -> String {
    let sign = match rule.kind {
        ExitKind::StopLoss | ExitKind::TrailingStop => '-',
        ExitKind::TakeProfit => '+',
    };
    let magnitude = format_number(rule.magnitude);
    match (rule.basis, atr) {
        (ExitBasis::Percent, _) => format!("{reference} * (1 {sign} {magnitude} / 100)"),
        (ExitBasis::AtrMultiple, Some(atr)) => format!("{reference} {sign} {magnitude} * {atr}"),
        _ => format!("{reference} {sign} {magnitude}"),
    }
}

/// Extra condition an entry needs before it can buy anything. `None` when it
/// never can, so the rule is left out and later entry rules still run.
fn entry_size_check(sizing: &Sizing) -> Option<String> {
    match sizing {
        Sizing::FixedCash { amount } => {
            Some(format!(" and {} // close >= 1", format_number(*amount)))
        }
        Sizing::PercentOfEquity { percent } if *percent <= 0.0 => None,
        _ => Some(String::new()),
    }
}

fn write_buy(out: &mut String, sizing: &Sizing, indent: &str) -> std::fmt::Result {
    match sizing {
        Sizing::AllAvailable => writeln!(out, "{indent}self.buy()")?,
        Sizing::FixedShares { shares } => writeln!(
            out,
            "{indent}self.buy(size={})",
            format_number(shares.floor().max(1.0))
        )?,
        Sizing::FixedCash { amount } => writeln!(
            out,
            "{indent}self.buy(size=int({} // close))",
            format_number(*amount)
        )?,
        Sizing::PercentOfEquity { percent } => {
            // backtesting.py reads sizes in (0, 1) as a fraction of equity.
            let fraction = (percent / 100.0).min(0.9999);
            writeln!(out, "{indent}self.buy(size={})", format_number(fraction))?;
        }
    }
    writeln!(out, "{indent}self._opened(close)")?;
    writeln!(out, "{indent}return")
}

fn write_state_helpers(out: &mut String, strategy: &CompiledStrategy) -> std::fmt::Result {
    let body = INDENT.repeat(2);
    for (name, entry) in [("_opened(self, price)", "price"), ("_flat(self)", "None")] {
        writeln!(out, "{INDENT}def {name}:")?;
        writeln!(out, "{body}self.entry_price = {entry}")?;
        for (i, _) in trailing_rules(strategy) {
            writeln!(out, "{body}self.{} = None", trail_attr(i))?;
        }
        if name.starts_with("_opened") {
            writeln!(out)?;
        }
    }
    Ok(())
}

fn actions(
    strategy: &CompiledStrategy,
    direction: Direction,
) -> impl Iterator<Item = &ActionRule> {
    strategy
        .actions()
        .iter()
        .filter(move |rule| rule.direction == direction)
}

fn trailing_rules(strategy: &CompiledStrategy) -> impl Iterator<Item = (usize, &ExitRule)> {
    strategy
        .exits()
        .iter()
        .enumerate()
        .filter(|(_, rule)| rule.is_trailing())
}

fn trail_attr(index: usize) -> String {
    format!("trail_{index}")
}

fn py_predicate(predicate: &Predicate) -> String {
    match predicate {
        Predicate::Always => "True".into(),
        Predicate::Compare { left, op, right } => {
            format!("{} {op} {}", py_expr(left), py_expr(right))
        }
        Predicate::All { of } => py_group(of, " and "),
        Predicate::Any { of } => py_group(of, " or "),
        Predicate::Not { of } => format!("not ({})", py_predicate(of)),
    }
}

fn py_group(parts: &[Predicate], sep: &str) -> String {
    let parts: Vec<String> = parts.iter().map(py_predicate).collect();
    format!("({})", parts.join(sep))
}

fn py_expr(expr: &Expression) -> String {
    match expr {
        Expression::Price { field, offset } => {
            format!("self.data.{}[-{}]", field.label(), offset.saturating_add(1))
        }
        Expression::Indicator { spec, offset } => {
            format!("self.{}[-{}]", spec.key(), offset.saturating_add(1))
        }
        Expression::Literal { value } => format_number(*value),
    }
}

/// `self.I(...)` call producing one indicator series.
fn talib_indicator(spec: &IndicatorSpec) -> String {
    let p = |name: &str| format_number(spec.param(name));
    let (inputs, call) = match spec.indicator {
        IndicatorKind::Sma => ("c", format!("talib.SMA(c, timeperiod={})", p("period"))),
        IndicatorKind::Ema => ("c", format!("talib.EMA(c, timeperiod={})", p("period"))),
        IndicatorKind::Wma => ("c", format!("talib.WMA(c, timeperiod={})", p("period"))),
        IndicatorKind::Rsi => ("c", format!("talib.RSI(c, timeperiod={})", p("period"))),
        IndicatorKind::MacdLine | IndicatorKind::MacdSignal | IndicatorKind::MacdHistogram => {
            let line = match spec.indicator {
                IndicatorKind::MacdLine => 0,
                IndicatorKind::MacdSignal => 1,
                _ => 2,
            };
            (
                "c",
                format!(
                    "talib.MACD(c, fastperiod={}, slowperiod={}, signalperiod={})[{line}]",
                    p("fast"),
                    p("slow"),
                    p("signal")
                ),
            )
        }
        IndicatorKind::BollingerUpper
        | IndicatorKind::BollingerMiddle
        | IndicatorKind::BollingerLower => {
            let band = match spec.indicator {
                IndicatorKind::BollingerUpper => 0,
                IndicatorKind::BollingerMiddle => 1,
                _ => 2,
            };
            (
                "c",
                format!(
                    "talib.BBANDS(c, timeperiod={}, nbdevup={k}, nbdevdn={k})[{band}]",
                    p("period"),
                    k = p("std_dev")
                ),
            )
        }
        IndicatorKind::StochK | IndicatorKind::StochD => {
            let line = usize::from(spec.indicator == IndicatorKind::StochD);
            (
                "h, l, c",
                format!(
                    "talib.STOCH(h, l, c, fastk_period={}, slowk_period={d}, slowd_period={d})[{line}]",
                    p("k_period"),
                    d = p("d_period")
                ),
            )
        }
        IndicatorKind::Atr => ("h, l, c", format!("talib.ATR(h, l, c, timeperiod={})", p("period"))),
        IndicatorKind::Adx => ("h, l, c", format!("talib.ADX(h, l, c, timeperiod={})", p("period"))),
        IndicatorKind::Cci => ("h, l, c", format!("talib.CCI(h, l, c, timeperiod={})", p("period"))),
        IndicatorKind::Roc => ("c", format!("talib.ROC(c, timeperiod={})", p("period"))),
        IndicatorKind::Momentum => ("c", format!("talib.MOM(c, timeperiod={})", p("period"))),
        IndicatorKind::Obv => ("c, v", "talib.OBV(c, v)".to_string()),
        IndicatorKind::DonchianUpper => ("h", format!("talib.MAX(h, timeperiod={})", p("period"))),
        IndicatorKind::DonchianLower => ("l", format!("talib.MIN(l, timeperiod={})", p("period"))),
        // talib.AROON returns (down, up).
        IndicatorKind::AroonUp => ("h, l", format!("talib.AROON(h, l, timeperiod={})[1]", p("period"))),
        IndicatorKind::AroonDown => {
            ("h, l", format!("talib.AROON(h, l, timeperiod={})[0]", p("period")))
        }
    };

    let args: Vec<&str> = inputs
        .split(", ")
        .map(|input| match input {
            "h" => "self.data.High",
            "l" => "self.data.Low",
            "v" => "self.data.Volume",
            _ => "self.data.Close",
        })
        .collect();
    format!(
        "self.I(lambda {inputs}: {call}, {}, name={:?})",
        args.join(", "),
        spec.to_string()
    )
}
