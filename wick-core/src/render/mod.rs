//! Renderings of a compiled strategy: a human-readable report, and source
//! code for the backtesting.py runners.

pub mod python;

use std::fmt::Write;

use crate::compiler::CompiledStrategy;

/// Multi-line report of what a graph compiled to.
pub fn explain(strategy: &CompiledStrategy) -> String {
    let mut out = String::new();
    write_report(&mut out, strategy).expect("writing to a String never fails");
    out
}

fn write_report(out: &mut String, strategy: &CompiledStrategy) -> std::fmt::Result {
    writeln!(out, "strategy {}", strategy.fingerprint().short())?;
    writeln!(out, "history: {} bar(s)", strategy.history_required())?;

    writeln!(out, "indicators:")?;
    if strategy.indicators().is_empty() {
        writeln!(out, "  (none)")?;
    }
    for spec in strategy.indicators() {
        writeln!(out, "  {spec} [{}]", spec.key())?;
    }

    writeln!(out, "actions:")?;
    for rule in strategy.actions() {
        writeln!(out, "  {rule}")?;
    }

    writeln!(out, "exits:")?;
    if strategy.exits().is_empty() {
        writeln!(out, "  (none)")?;
    }
    for rule in strategy.exits() {
        writeln!(out, "  {rule}")?;
    }
    Ok(())
}
