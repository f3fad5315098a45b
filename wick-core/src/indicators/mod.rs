//! Indicator catalog: the closed set of indicators a graph may reference.
//!
//! The compiler never computes indicator values. It only needs to know which
//! indicators exist, which parameters each one takes, and the documented
//! default for every parameter, so it can name the series an execution
//! engine must supply.
//!
//! Multi-output indicators (MACD, Bollinger, Stochastic, Donchian, Aroon) are
//! exposed as one kind per output line, keeping every reference single-series.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::format_number;

/// Definition of one indicator parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDef {
    pub name: &'static str,
    pub default: f64,
    /// Integer-valued parameters (periods) must be whole numbers >= 1.
    pub integer: bool,
}

const fn period(default: f64) -> ParamDef {
    ParamDef {
        name: "period",
        default,
        integer: true,
    }
}

const MA_PARAMS: &[ParamDef] = &[period(20.0)];
const RSI_PARAMS: &[ParamDef] = &[period(14.0)];
const MACD_PARAMS: &[ParamDef] = &[
    ParamDef { name: "fast", default: 12.0, integer: true },
    ParamDef { name: "slow", default: 26.0, integer: true },
    ParamDef { name: "signal", default: 9.0, integer: true },
];
const BOLLINGER_PARAMS: &[ParamDef] = &[
    period(20.0),
    ParamDef { name: "std_dev", default: 2.0, integer: false },
];
const STOCH_PARAMS: &[ParamDef] = &[
    ParamDef { name: "k_period", default: 14.0, integer: true },
    ParamDef { name: "d_period", default: 3.0, integer: true },
];
const WILDER_PARAMS: &[ParamDef] = &[period(14.0)];
const CCI_PARAMS: &[ParamDef] = &[period(20.0)];
const ROC_PARAMS: &[ParamDef] = &[period(12.0)];
const MOMENTUM_PARAMS: &[ParamDef] = &[period(10.0)];
const CHANNEL_PARAMS: &[ParamDef] = &[period(20.0)];
const AROON_PARAMS: &[ParamDef] = &[period(25.0)];

/// The closed indicator vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    Sma,
    Ema,
    Wma,
    Rsi,
    MacdLine,
    MacdSignal,
    MacdHistogram,
    BollingerUpper,
    BollingerMiddle,
    BollingerLower,
    StochK,
    StochD,
    Atr,
    Adx,
    Cci,
    Roc,
    Momentum,
    Obv,
    DonchianUpper,
    DonchianLower,
    AroonUp,
    AroonDown,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 22] = [
        Self::Sma,
        Self::Ema,
        Self::Wma,
        Self::Rsi,
        Self::MacdLine,
        Self::MacdSignal,
        Self::MacdHistogram,
        Self::BollingerUpper,
        Self::BollingerMiddle,
        Self::BollingerLower,
        Self::StochK,
        Self::StochD,
        Self::Atr,
        Self::Adx,
        Self::Cci,
        Self::Roc,
        Self::Momentum,
        Self::Obv,
        Self::DonchianUpper,
        Self::DonchianLower,
        Self::AroonUp,
        Self::AroonDown,
    ];

    /// Wire name, also the prefix of the series key (`rsi` → `rsi_14`).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sma => "sma",
            Self::Ema => "ema",
            Self::Wma => "wma",
            Self::Rsi => "rsi",
            Self::MacdLine => "macd_line",
            Self::MacdSignal => "macd_signal",
            Self::MacdHistogram => "macd_histogram",
            Self::BollingerUpper => "bollinger_upper",
            Self::BollingerMiddle => "bollinger_middle",
            Self::BollingerLower => "bollinger_lower",
            Self::StochK => "stoch_k",
            Self::StochD => "stoch_d",
            Self::Atr => "atr",
            Self::Adx => "adx",
            Self::Cci => "cci",
            Self::Roc => "roc",
            Self::Momentum => "momentum",
            Self::Obv => "obv",
            Self::DonchianUpper => "donchian_upper",
            Self::DonchianLower => "donchian_lower",
            Self::AroonUp => "aroon_up",
            Self::AroonDown => "aroon_down",
        }
    }

    /// Label used in rendered predicates (`RSI(14)`).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sma => "SMA",
            Self::Ema => "EMA",
            Self::Wma => "WMA",
            Self::Rsi => "RSI",
            Self::MacdLine => "MACD",
            Self::MacdSignal => "MACD.signal",
            Self::MacdHistogram => "MACD.hist",
            Self::BollingerUpper => "BB.upper",
            Self::BollingerMiddle => "BB.middle",
            Self::BollingerLower => "BB.lower",
            Self::StochK => "Stoch.K",
            Self::StochD => "Stoch.D",
            Self::Atr => "ATR",
            Self::Adx => "ADX",
            Self::Cci => "CCI",
            Self::Roc => "ROC",
            Self::Momentum => "MOM",
            Self::Obv => "OBV",
            Self::DonchianUpper => "Donchian.upper",
            Self::DonchianLower => "Donchian.lower",
            Self::AroonUp => "Aroon.up",
            Self::AroonDown => "Aroon.down",
        }
    }

    /// Parameters in their canonical order, with documented defaults.
    pub fn params(&self) -> &'static [ParamDef] {
        match self {
            Self::Sma | Self::Ema | Self::Wma => MA_PARAMS,
            Self::Rsi => RSI_PARAMS,
            Self::MacdLine | Self::MacdSignal | Self::MacdHistogram => MACD_PARAMS,
            Self::BollingerUpper | Self::BollingerMiddle | Self::BollingerLower => {
                BOLLINGER_PARAMS
            }
            Self::StochK | Self::StochD => STOCH_PARAMS,
            Self::Atr | Self::Adx => WILDER_PARAMS,
            Self::Cci => CCI_PARAMS,
            Self::Roc => ROC_PARAMS,
            Self::Momentum => MOMENTUM_PARAMS,
            Self::Obv => &[],
            Self::DonchianUpper | Self::DonchianLower => CHANNEL_PARAMS,
            Self::AroonUp | Self::AroonDown => AROON_PARAMS,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fully parameterised indicator series requirement.
///
/// Parameters are stored in a `BTreeMap` so serialization is key-ordered and
/// hashing is deterministic. Every parameter the kind defines is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSpec {
    pub indicator: IndicatorKind,
    pub params: BTreeMap<String, f64>,
}

impl IndicatorSpec {
    /// Spec with every parameter at its documented default.
    pub fn with_defaults(indicator: IndicatorKind) -> Self {
        let params = indicator
            .params()
            .iter()
            .map(|p| (p.name.to_string(), p.default))
            .collect();
        Self { indicator, params }
    }

    /// ATR requirement for a given period (used by ATR-based exits).
    pub fn atr(period: usize) -> Self {
        let mut spec = Self::with_defaults(IndicatorKind::Atr);
        spec.params.insert("period".into(), period as f64);
        spec
    }

    /// Parameter value, falling back to the documented default.
    pub fn param(&self, name: &str) -> f64 {
        self.params.get(name).copied().unwrap_or_else(|| {
            self.indicator
                .params()
                .iter()
                .find(|p| p.name == name)
                .map(|p| p.default)
                .unwrap_or(f64::NAN)
        })
    }

    /// Integer parameter (periods).
    pub fn param_usize(&self, name: &str) -> usize {
        self.param(name) as usize
    }

    /// Parameter values in canonical order.
    pub fn ordered_values(&self) -> Vec<f64> {
        self.indicator
            .params()
            .iter()
            .map(|p| self.param(p.name))
            .collect()
    }

    /// Stable series key (`rsi_14`, `bollinger_upper_20_2`, `obv`).
    ///
    /// The runtime looks series up by this key and the code generator uses it
    /// as the attribute name, so it must stay an identifier.
    pub fn key(&self) -> String {
        let mut key = self.indicator.name().to_string();
        for value in self.ordered_values() {
            key.push('_');
            key.push_str(&format_number(value).replace('.', "p"));
        }
        key
    }
}

impl fmt::Display for IndicatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self.ordered_values();
        if values.is_empty() {
            return f.write_str(self.indicator.label());
        }
        let rendered: Vec<String> = values.into_iter().map(format_number).collect();
        write!(f, "{}({})", self.indicator.label(), rendered.join(", "))
    }
}

/// Why a supplied parameter value was rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidParam {
    pub param: String,
    pub value: f64,
    pub reason: &'static str,
}

/// Outcome of resolving a node's raw parameter map against the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParams {
    pub spec: IndicatorSpec,
    /// Parameters that were absent and filled from a default (name, value used).
    pub defaulted: Vec<(&'static str, f64)>,
    /// Supplied parameter names the indicator does not define.
    pub unknown: Vec<String>,
}

/// Check a single parameter value against its definition.
pub fn check_param(def: &ParamDef, value: f64) -> Result<(), InvalidParam> {
    let reject = |reason| {
        Err(InvalidParam {
            param: def.name.to_string(),
            value,
            reason,
        })
    };
    if !value.is_finite() {
        return reject("must be a finite number");
    }
    if value <= 0.0 {
        return reject("must be positive");
    }
    if def.integer && (value.fract() != 0.0 || value < 1.0) {
        return reject("must be a whole number >= 1");
    }
    Ok(())
}

/// Resolve supplied parameters against the catalog.
///
/// Missing parameters take the value from `overrides` (configured defaults)
/// when present, otherwise the documented default. Both cases are reported in
/// `defaulted` so the compiler can surface a warning.
pub fn resolve_params(
    indicator: IndicatorKind,
    given: &BTreeMap<String, f64>,
    overrides: Option<&BTreeMap<String, f64>>,
) -> Result<ResolvedParams, InvalidParam> {
    let defs = indicator.params();
    let mut params = BTreeMap::new();
    let mut defaulted = Vec::new();

    for def in defs {
        match given.get(def.name) {
            Some(&value) => {
                check_param(def, value)?;
                params.insert(def.name.to_string(), value);
            }
            None => {
                let value = overrides
                    .and_then(|o| o.get(def.name).copied())
                    .unwrap_or(def.default);
                params.insert(def.name.to_string(), value);
                defaulted.push((def.name, value));
            }
        }
    }

    let unknown = given
        .keys()
        .filter(|name| !defs.iter().any(|d| d.name == name.as_str()))
        .cloned()
        .collect();

    Ok(ResolvedParams {
        spec: IndicatorSpec { indicator, params },
        defaulted,
        unknown,
    })
}
