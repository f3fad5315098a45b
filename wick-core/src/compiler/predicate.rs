//! Boolean predicates over bar index: the compiler's output AST.
//!
//! Constructors normalise lightly (drop `Always` from conjunctions, collapse
//! single-element groups) but never reorder operands, so the structure still
//! mirrors the graph that produced it.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::expr::Expression;
use crate::graph::Comparison;

/// Binary comparison between two expressions sampled at the same bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
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
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Eq => "==",
            Self::Ge => ">=",
            Self::Le => "<=",
        }
    }

    pub fn apply(&self, left: f64, right: f64) -> bool {
        match self {
            Self::Gt => left > right,
            Self::Lt => left < right,
            Self::Eq => left == right,
            Self::Ge => left >= right,
            Self::Le => left <= right,
        }
    }

    /// The plain operator for a node comparison; `None` for crossovers.
    pub fn from_comparison(comparison: Comparison) -> Option<Self> {
        match comparison {
            Comparison::Gt => Some(Self::Gt),
            Comparison::Lt => Some(Self::Lt),
            Comparison::Eq => Some(Self::Eq),
            Comparison::Ge => Some(Self::Ge),
            Comparison::Le => Some(Self::Le),
            Comparison::CrossesAbove | Comparison::CrossesBelow => None,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    /// Imposes no constraint (empty gate, ungated action).
    Always,
    Compare {
        left: Expression,
        op: CompareOp,
        right: Expression,
    },
    All {
        of: Vec<Predicate>,
    },
    Any {
        of: Vec<Predicate>,
    },
    Not {
        of: Box<Predicate>,
    },
}

impl Predicate {
    pub fn compare(left: Expression, op: CompareOp, right: Expression) -> Self {
        Self::Compare { left, op, right }
    }

    /// Conjunction. `Always` operands are dropped; an empty conjunction is `Always`.
    pub fn all(parts: Vec<Predicate>) -> Self {
        let mut parts: Vec<Predicate> = parts
            .into_iter()
            .filter(|p| !matches!(p, Self::Always))
            .collect();
        match parts.len() {
            0 => Self::Always,
            1 => parts.remove(0),
            _ => Self::All { of: parts },
        }
    }

    /// Disjunction. Any `Always` operand makes the whole disjunction `Always`,
    /// and so does an empty one: a gate with no inputs imposes no constraint.
    pub fn any(mut parts: Vec<Predicate>) -> Self {
        if parts.is_empty() || parts.iter().any(|p| matches!(p, Self::Always)) {
            return Self::Always;
        }
        if parts.len() == 1 {
            return parts.remove(0);
        }
        Self::Any { of: parts }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Predicate) -> Self {
        Self::Not {
            of: Box::new(inner),
        }
    }

    /// Visit every expression in evaluation order.
    pub fn for_each_expression<'a>(&'a self, f: &mut impl FnMut(&'a Expression)) {
        match self {
            Self::Always => {}
            Self::Compare { left, right, .. } => {
                f(left);
                f(right);
            }
            Self::All { of } | Self::Any { of } => {
                for p in of {
                    p.for_each_expression(f);
                }
            }
            Self::Not { of } => of.for_each_expression(f),
        }
    }

    /// Largest bar offset referenced, `None` if only literals are compared.
    pub fn max_offset(&self) -> Option<usize> {
        let mut max = None;
        self.for_each_expression(&mut |e| {
            if let Some(offset) = e.offset() {
                max = Some(max.map_or(offset, |m: usize| m.max(offset)));
            }
        });
        max
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("true"),
            Self::Compare { left, op, right } => write!(f, "{left} {op} {right}"),
            Self::All { of } => write_group(f, of, " and "),
            Self::Any { of } => write_group(f, of, " or "),
            Self::Not { of } => match of.as_ref() {
                Self::Compare { .. } => write!(f, "not ({of})"),
                _ => write!(f, "not {of}"),
            },
        }
    }
}

fn write_group(f: &mut fmt::Formatter<'_>, parts: &[Predicate], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{part}")?;
    }
    f.write_str(")")
}
