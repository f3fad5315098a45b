//! Direct interpretation of the predicate AST against a `SeriesSet`.
//!
//! `t` is always the index of the most recently closed bar; offset `k`
//! reads bar `t - k`. A reference before the first bar, past the end of its
//! series, or landing on NaN is unavailable, and any comparison touching an
//! unavailable value is false.

use super::series::SeriesSet;
use crate::compiler::{Expression, Predicate};

impl Expression {
    pub fn value_at(&self, series: &SeriesSet, t: usize) -> Option<f64> {
        let value = match self {
            Self::Literal { value } => Some(*value),
            Self::Price { field, offset } => series.get(field.key(), t.checked_sub(*offset)?),
            Self::Indicator { spec, offset } => series.get(&spec.key(), t.checked_sub(*offset)?),
        };
        value.filter(|v| !v.is_nan())
    }
}

impl Predicate {
    pub fn evaluate(&self, series: &SeriesSet, t: usize) -> bool {
        match self {
            Self::Always => true,
            Self::Compare { left, op, right } => {
                match (left.value_at(series, t), right.value_at(series, t)) {
                    (Some(l), Some(r)) => op.apply(l, r),
                    _ => false,
                }
            }
            Self::All { of } => of.iter().all(|p| p.evaluate(series, t)),
            Self::Any { of } => of.iter().any(|p| p.evaluate(series, t)),
            Self::Not { of } => !of.evaluate(series, t),
        }
    }
}
