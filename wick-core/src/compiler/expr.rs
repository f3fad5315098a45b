//! Scalar expressions: time-indexed references to series, or literals.
//!
//! An expression is a descriptor, never a value: it names what to read and
//! how many closed bars back, and an execution engine (or the reference
//! runtime) looks the value up later.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::format_number;
use crate::graph::PriceField;
use crate::indicators::IndicatorSpec;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expression {
    /// A price column, `offset` closed bars back (0 = most recent).
    Price { field: PriceField, offset: usize },
    /// A parameterised indicator series, `offset` closed bars back.
    Indicator { spec: IndicatorSpec, offset: usize },
    /// A constant; offsets do not apply.
    Literal { value: f64 },
}

impl Expression {
    pub fn literal(value: f64) -> Self {
        Self::Literal { value }
    }

    /// Bars back this expression reads, `None` for literals.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::Price { offset, .. } | Self::Indicator { offset, .. } => Some(*offset),
            Self::Literal { .. } => None,
        }
    }

    /// Key of the series this expression reads, `None` for literals.
    pub fn series_key(&self) -> Option<String> {
        match self {
            Self::Price { field, .. } => Some(field.key().to_string()),
            Self::Indicator { spec, .. } => Some(spec.key()),
            Self::Literal { .. } => None,
        }
    }
}

/// Renders with the target-runtime indexing convention: offset 0 is `[-1]`,
/// the most recently closed bar.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Price { field, offset } => {
                write!(f, "{field}[-{}]", offset.saturating_add(1))
            }
            Self::Indicator { spec, offset } => {
                write!(f, "{spec}[-{}]", offset.saturating_add(1))
            }
            Self::Literal { value } => f.write_str(&format_number(*value)),
        }
    }
}
