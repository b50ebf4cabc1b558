//! Statecraft CLI
//!
//! Lists registered methods, writes and checks graph files, and runs graphs
//! on a fixed tick interval.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use statecraft::config::Config;
use statecraft::summary::GraphSummary;
use statecraft::{modules, sample, store};
use statecraft_runtime::{Machine, MethodDef, MethodRegistry, TickOutcome};
use statecraft_types::ValueKind;

/// Statecraft state machine host
#[derive(Parser, Debug)]
#[command(name = "statecraft")]
#[command(about = "Build, check and run tick-driven state graphs", long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "statecraft.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered actions, conditions and filters
    Methods {
        /// Only list methods whose result can feed this kind
        #[arg(long)]
        kind: Option<String>,
    },
    /// Write the sample graph
    New { path: PathBuf },
    /// Load a graph and print a summary
    Check { path: PathBuf },
    /// Run a graph
    Run {
        path: PathBuf,
        /// Ticks to run; 0 runs until interrupted
        #[arg(long)]
        ticks: Option<u64>,
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Start in this state instead of the initial one
        #[arg(long)]
        initial: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)
        .await
        .with_context(|| format!("loading {}", args.config.display()))?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log.filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let registry = MethodRegistry::install(modules::registry()?)?;

    match args.command {
        Command::Methods { kind } => list_methods(&registry, kind.as_deref()),
        Command::New { path } => {
            let graph = sample::build(&registry)?;
            store::save_graph(&path, &graph).await?;
            println!("Wrote sample graph to {}", path.display());
            Ok(())
        }
        Command::Check { path } => {
            let graph = store::load_graph(&path, &registry)
                .await
                .with_context(|| format!("checking {}", path.display()))?;
            let summary = GraphSummary::of(&graph);
            print!("{summary}");
            if !summary.is_complete() {
                warn!("{} arguments are not bound", summary.unbound.len());
            }
            Ok(())
        }
        Command::Run {
            path,
            ticks,
            interval_ms,
            initial,
        } => {
            let runtime = config.runtime;
            run(
                &registry,
                &path,
                ticks.unwrap_or(runtime.ticks),
                interval_ms.unwrap_or(runtime.interval_ms),
                initial.or(runtime.initial_state),
            )
            .await
        }
    }
}

fn describe(def: &MethodDef) -> String {
    let params: Vec<_> = def
        .parameters
        .iter()
        .map(|p| format!("{}: {}", p.name, p.kind))
        .collect();
    let returns = def
        .returns
        .as_ref()
        .map(|kind| format!(" -> {kind}"))
        .unwrap_or_default();
    format!("{:<28} {}({}){}", def.display_name, def.key(), params.join(", "), returns)
}

fn list_methods(registry: &MethodRegistry, kind: Option<&str>) -> Result<()> {
    if let Some(kind) = kind {
        let kind: ValueKind = kind.parse()?;
        for def in registry.filters(&kind) {
            println!("{}", describe(def));
        }
        return Ok(());
    }

    println!("Actions:");
    for def in registry.actions() {
        println!("  {}", describe(def));
    }
    println!("Conditions:");
    for def in registry.conditions() {
        println!("  {}", describe(def));
    }
    println!("Filters:");
    for def in registry.filters(&ValueKind::Any) {
        println!("  {}", describe(def));
    }
    Ok(())
}

async fn run(
    registry: &MethodRegistry,
    path: &Path,
    ticks: u64,
    interval_ms: u64,
    initial: Option<String>,
) -> Result<()> {
    let graph = store::load_graph(path, registry)
        .await
        .with_context(|| format!("loading {}", path.display()))?;
    let mut machine = Machine::new(graph);

    match initial {
        Some(name) => {
            let Some(state) = machine.graph().state_id(&name) else {
                bail!("Graph has no state named '{name}'");
            };
            machine.start_at(state)?;
        }
        None => {
            machine.start()?;
        }
    }

    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
    // the first tick of a tokio interval completes immediately
    interval.tick().await;

    while ticks == 0 || machine.ticks() < ticks {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }

        match machine.tick()? {
            TickOutcome::Stayed(_) => {}
            TickOutcome::Transitioned { to, .. } => {
                let name = machine.graph().state(to).map(|s| s.name()).unwrap_or("");
                println!("[{}] -> {}", machine.ticks(), name);
            }
        }
    }

    let current = machine.current_state().map(|s| s.name()).unwrap_or("-");
    info!("Stopped in {} after {} ticks", current, machine.ticks());
    Ok(())
}
