//! Strategy graph compiler.
//!
//! `compile` validates a graph snapshot, then walks backwards from every
//! Action node through its flow parents, resolving condition nodes into
//! time-indexed expressions and composing them through the logic gates.
//! Exit nodes compile separately into position-scoped risk rules.
//!
//! The output is pure data: a `CompiledStrategy` never holds run state, so a
//! single compiled artifact can be shared by any number of concurrent runs.

mod action;
mod condition;
mod context;
mod exit;
pub mod expr;
mod logic;
pub mod predicate;
mod resolve;
pub mod warning;

pub use action::{ActionRule, Direction, Sizing};
pub use exit::ExitRule;
pub use expr::Expression;
pub use predicate::{CompareOp, Predicate};
pub use warning::CompileWarning;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{CompilerConfig, ConfigError};
use crate::domain::{NodeId, StrategyHash};
use crate::graph::{validate, Graph, GraphError, ValidatedGraph};
use crate::indicators::IndicatorSpec;

use context::CompileContext;

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("invalid compiler config: {0}")]
    Config(#[from] ConfigError),
    #[error("{} warning(s) promoted to errors in strict mode", .0.len())]
    WarningsAsErrors(Vec<CompileWarning>),
}

/// Per-run state an execution engine must allocate for the exit rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "slot", rename_all = "snake_case")]
pub enum StateSlot {
    /// Fill price of the open position.
    EntryPrice,
    /// Ratcheted stop level for one trailing-stop rule.
    TrailingStop { rule: NodeId },
}

/// Immutable output of one compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledStrategy {
    indicators: Vec<IndicatorSpec>,
    actions: Vec<ActionRule>,
    exits: Vec<ExitRule>,
    state_slots: Vec<StateSlot>,
}

impl CompiledStrategy {
    /// Indicator series the strategy reads, deduplicated, in first-use order.
    pub fn indicators(&self) -> &[IndicatorSpec] {
        &self.indicators
    }

    /// One rule per Action node, in node order.
    pub fn actions(&self) -> &[ActionRule] {
        &self.actions
    }

    /// Risk exits in node order.
    pub fn exits(&self) -> &[ExitRule] {
        &self.exits
    }

    pub fn state_slots(&self) -> &[StateSlot] {
        &self.state_slots
    }

    /// Closed bars needed before every reference is defined: the largest
    /// offset referenced plus one. Exits read the latest close (and ATR).
    pub fn history_required(&self) -> usize {
        let mut max: Option<usize> = if self.exits.is_empty() { None } else { Some(0) };
        for rule in &self.actions {
            if let Some(offset) = rule.predicate.max_offset() {
                max = Some(max.map_or(offset, |m| m.max(offset)));
            }
        }
        max.map_or(0, |m| m.saturating_add(1))
    }

    /// BLAKE3 over the canonical JSON form.
    pub fn fingerprint(&self) -> StrategyHash {
        // Plain data with string keys; serde_json cannot fail on it.
        let bytes = serde_json::to_vec(self).expect("compiled strategy serializes");
        StrategyHash::from_bytes(&bytes)
    }
}

/// A compiled strategy plus the warnings collected on the way.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Compilation {
    pub strategy: CompiledStrategy,
    pub warnings: Vec<CompileWarning>,
}

/// Validate and compile a graph snapshot.
pub fn compile(graph: &Graph, config: &CompilerConfig) -> Result<Compilation, CompileError> {
    let validated = validate(graph)?;
    compile_validated(&validated, config)
}

/// Compile an already validated graph.
pub fn compile_validated(
    graph: &ValidatedGraph,
    config: &CompilerConfig,
) -> Result<Compilation, CompileError> {
    config.check()?;
    debug!(
        nodes = graph.nodes().len(),
        edges = graph.graph().edges.len(),
        "compiling strategy graph"
    );

    let mut ctx = CompileContext::new(graph, config);
    let actions = graph
        .actions()
        .map(|node| ctx.compile_action(node))
        .collect::<Result<Vec<_>, _>>()?;
    let exits = graph
        .exits()
        .map(|node| ctx.compile_exit(node))
        .collect::<Result<Vec<_>, _>>()?;

    for node in graph.nodes() {
        let feeds_actions = !(node.is_action() || node.is_exit());
        if feeds_actions && !graph.is_reachable(&node.id) {
            ctx.warn(CompileWarning::UnreachableNode {
                node: node.id.clone(),
            });
        }
    }

    let (indicators, warnings) = ctx.into_parts();
    let state_slots = state_slots(&exits);
    let strategy = CompiledStrategy {
        indicators,
        actions,
        exits,
        state_slots,
    };

    if config.strict && !warnings.is_empty() {
        return Err(CompileError::WarningsAsErrors(warnings));
    }

    debug!(
        actions = strategy.actions.len(),
        exits = strategy.exits.len(),
        indicators = strategy.indicators.len(),
        warnings = warnings.len(),
        fingerprint = %strategy.fingerprint().short(),
        "compiled strategy"
    );
    Ok(Compilation { strategy, warnings })
}

fn state_slots(exits: &[ExitRule]) -> Vec<StateSlot> {
    if exits.is_empty() {
        return Vec::new();
    }
    let mut slots = vec![StateSlot::EntryPrice];
    slots.extend(
        exits
            .iter()
            .filter(|rule| rule.is_trailing())
            .map(|rule| StateSlot::TrailingStop {
                rule: rule.node.clone(),
            }),
    );
    slots
}
