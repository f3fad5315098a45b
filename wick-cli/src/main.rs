//! Wick CLI: compile strategy graphs and inspect the result.
//!
//! Commands:
//! - `compile` : compile one or more graphs to the JSON artifact
//! - `check`   : validate graphs without compiling
//! - `explain` : human-readable report of a compiled graph
//! - `codegen` : emit a backtesting.py strategy class
//! - `replay`  : run the reference session over a bar CSV

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use wick_core::data::load_csv;
use wick_core::render::{explain, python};
use wick_core::runtime::{replay, Decision};
use wick_core::{compile, validate, Compilation, CompilerConfig, Graph};

#[derive(Parser)]
#[command(name = "wick", about = "Strategy graph compiler")]
struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile graphs and print or write the compiled JSON
    Compile {
        /// Graph JSON files
        #[arg(required = true)]
        graphs: Vec<PathBuf>,

        /// Compiler config (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write one `<name>.json` per graph here instead of printing
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Validate graphs only
    Check {
        #[arg(required = true)]
        graphs: Vec<PathBuf>,
    },

    /// Print a readable report of the compiled strategy
    Explain {
        graph: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Generate a backtesting.py strategy class
    Codegen {
        graph: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,

        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Replay the strategy over historical bars
    Replay {
        graph: PathBuf,

        /// Bar CSV with date,open,high,low,close,volume columns
        #[arg(long)]
        bars: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Compile {
            graphs,
            config,
            out,
        } => run_compile(&graphs, config.as_deref(), out.as_deref()),
        Commands::Check { graphs } => run_check(&graphs),
        Commands::Explain { graph, config } => run_explain(&graph, config.as_deref()),
        Commands::Codegen { graph, config, out } => {
            run_codegen(&graph, config.as_deref(), out.as_deref())
        }
        Commands::Replay {
            graph,
            bars,
            config,
        } => run_replay(&graph, &bars, config.as_deref()),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

// ── Loading ─────────────────────────────────────────────────────────

fn load_graph(path: &Path) -> Result<Graph> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading graph {}", path.display()))?;
    Graph::from_json(&text).with_context(|| format!("parsing graph {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<CompilerConfig> {
    match path {
        Some(path) => CompilerConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(CompilerConfig::default()),
    }
}

fn compile_file(path: &Path, config: &CompilerConfig) -> Result<Compilation> {
    let graph = load_graph(path)?;
    compile(&graph, config).with_context(|| format!("compiling {}", path.display()))
}

fn print_warnings(compilation: &Compilation) {
    for warning in &compilation.warnings {
        eprintln!("warning: {warning}");
    }
}

// ── Commands ────────────────────────────────────────────────────────

fn run_compile(graphs: &[PathBuf], config: Option<&Path>, out: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    if let Some(dir) = out {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }

    let results: Vec<(&PathBuf, Result<Compilation>)> = graphs
        .par_iter()
        .map(|path| (path, compile_file(path, &config)))
        .collect();

    let mut failed = 0usize;
    for (path, result) in results {
        let compilation = match result {
            Ok(compilation) => compilation,
            Err(err) => {
                eprintln!("Error for {}: {err:#}", path.display());
                failed += 1;
                continue;
            }
        };
        print_warnings(&compilation);

        let fingerprint = compilation.strategy.fingerprint();
        let artifact = serde_json::json!({
            "fingerprint": fingerprint,
            "strategy": compilation.strategy,
            "warnings": compilation.warnings,
        });
        let json = serde_json::to_string_pretty(&artifact)?;

        match out {
            Some(dir) => {
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| fingerprint.short().to_string());
                let target = dir.join(format!("{stem}.json"));
                std::fs::write(&target, json)
                    .with_context(|| format!("writing {}", target.display()))?;
                println!(
                    "{} -> {} ({})",
                    path.display(),
                    target.display(),
                    fingerprint.short()
                );
            }
            None => println!("{json}"),
        }
    }

    if failed > 0 {
        bail!("{failed} of {} graph(s) failed to compile", graphs.len());
    }
    Ok(())
}

fn run_check(graphs: &[PathBuf]) -> Result<()> {
    let mut failed = 0usize;
    for path in graphs {
        let outcome = load_graph(path).and_then(|graph| {
            validate(&graph).with_context(|| format!("validating {}", path.display()))
        });
        match outcome {
            Ok(validated) => println!(
                "{}: ok ({} action(s), {} exit(s))",
                path.display(),
                validated.actions().count(),
                validated.exits().count()
            ),
            Err(err) => {
                eprintln!("{}: {err:#}", path.display());
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} graph(s) invalid", graphs.len());
    }
    Ok(())
}

fn run_explain(graph: &Path, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let compilation = compile_file(graph, &config)?;
    print!("{}", explain(&compilation.strategy));
    if !compilation.warnings.is_empty() {
        println!("warnings:");
        for warning in &compilation.warnings {
            println!("  {warning}");
        }
    }
    Ok(())
}

fn run_codegen(graph: &Path, config: Option<&Path>, out: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let compilation = compile_file(graph, &config)?;
    print_warnings(&compilation);
    let source = python::generate(&compilation.strategy, &config.codegen)?;
    match out {
        Some(path) => {
            std::fs::write(path, source)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Generated {}", path.display());
        }
        None => print!("{source}"),
    }
    Ok(())
}

fn run_replay(graph: &Path, bars: &Path, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let compilation = compile_file(graph, &config)?;
    print_warnings(&compilation);

    let history = load_csv(bars).with_context(|| format!("loading bars {}", bars.display()))?;
    debug!(bars = history.bars.len(), "loaded bar history");
    let decisions = replay(&compilation.strategy, &history.series)?;

    let mut trades = 0usize;
    for (bar, decision) in history.bars.iter().zip(&decisions) {
        let (label, rule) = match decision {
            Decision::Hold => continue,
            Decision::Enter { rule } => ("enter", rule),
            Decision::Exit { rule } => ("exit", rule),
            Decision::RiskExit { rule } => ("risk exit", rule),
        };
        if matches!(decision, Decision::Enter { .. }) {
            trades += 1;
        }
        println!("{}  {label:<9}  {rule}  close={}", bar.date, bar.close);
    }
    println!("{} bar(s), {trades} entr(ies)", decisions.len());
    Ok(())
}
