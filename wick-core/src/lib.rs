//! Wick: compiles visual trading-strategy graphs into deterministic,
//! bar-by-bar decision procedures.
//!
//! - [`graph`]: typed nodes and edges, structural validation
//! - [`compiler`]: graph -> `CompiledStrategy` (predicate AST, sizing, exits)
//! - [`render`]: diagnostic report and backtesting.py code generation
//! - [`runtime`]: reference interpreter for a compiled strategy
//! - [`data`]: CSV bar history for replay
//! - [`config`]: TOML compiler options

pub mod compiler;
pub mod config;
pub mod data;
pub mod domain;
pub mod graph;
pub mod indicators;
pub mod render;
pub mod runtime;

pub use compiler::{compile, Compilation, CompileError, CompiledStrategy};
pub use config::CompilerConfig;
pub use graph::{validate, Graph, GraphError};
