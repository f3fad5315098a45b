use std::collections::{HashMap, HashSet};

use tracing::warn;

use super::warning::CompileWarning;
use crate::config::CompilerConfig;
use crate::domain::NodeId;
use crate::graph::{GraphError, Node, NodeKind, ValidatedGraph};
use crate::indicators::{resolve_params, IndicatorSpec};

/// Mutable state threaded through one compilation.
///
/// Borrowed graph and config are read-only; everything the compiler
/// accumulates (warnings, indicator requirements, resolved parameter sets)
/// lives here and is moved into the output at the end.
pub(crate) struct CompileContext<'a> {
    pub(crate) graph: &'a ValidatedGraph,
    pub(crate) config: &'a CompilerConfig,
    warnings: Vec<CompileWarning>,
    indicators: Vec<IndicatorSpec>,
    seen_keys: HashSet<String>,
    specs: HashMap<NodeId, IndicatorSpec>,
}

impl<'a> CompileContext<'a> {
    pub(crate) fn new(graph: &'a ValidatedGraph, config: &'a CompilerConfig) -> Self {
        Self {
            graph,
            config,
            warnings: Vec::new(),
            indicators: Vec::new(),
            seen_keys: HashSet::new(),
            specs: HashMap::new(),
        }
    }

    /// Record a warning once. Shared nodes are reached from several actions
    /// and lookback shifts; the diagnostic should still appear a single time.
    pub(crate) fn warn(&mut self, warning: CompileWarning) {
        if self.warnings.contains(&warning) {
            return;
        }
        warn!(node = %warning.node(), "{warning}");
        self.warnings.push(warning);
    }

    /// Add an indicator requirement, keeping first-appearance order.
    pub(crate) fn require(&mut self, spec: &IndicatorSpec) {
        if self.seen_keys.insert(spec.key()) {
            self.indicators.push(spec.clone());
        }
    }

    /// Parameter set for an indicator node, resolved once per node.
    pub(crate) fn indicator_spec(&mut self, node: &Node) -> Result<IndicatorSpec, GraphError> {
        if let Some(spec) = self.specs.get(&node.id) {
            return Ok(spec.clone());
        }
        let NodeKind::Indicator {
            indicator, params, ..
        } = &node.kind
        else {
            return Err(GraphError::UnexpectedNodeKind {
                node: node.id.clone(),
                found: node.kind_name(),
                expected: "an indicator",
            });
        };

        let resolved = resolve_params(*indicator, params, self.config.defaults_for(*indicator))
            .map_err(|e| GraphError::InvalidParameter {
                node: node.id.clone(),
                param: e.param,
                reason: e.reason.into(),
            })?;

        for (param, value) in resolved.defaulted {
            self.warn(CompileWarning::DefaultParameter {
                node: node.id.clone(),
                indicator: *indicator,
                param: param.to_string(),
                value,
            });
        }
        for param in resolved.unknown {
            self.warn(CompileWarning::UnknownParameter {
                node: node.id.clone(),
                param,
            });
        }

        self.specs.insert(node.id.clone(), resolved.spec.clone());
        Ok(resolved.spec)
    }

    pub(crate) fn into_parts(self) -> (Vec<IndicatorSpec>, Vec<CompileWarning>) {
        (self.indicators, self.warnings)
    }
}
