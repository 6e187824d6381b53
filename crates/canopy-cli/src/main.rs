//! Canopy CLI - runs demonstration behavior graphs.
//!
//! - `canopy run <scenario>` - build a graph, tick it until it settles
//! - `canopy config` - print the effective configuration

mod scenario;

use std::path::PathBuf;

use anyhow::{Context, Result};
use canopy_core::EngineConfig;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use scenario::Scenario;

#[derive(Parser)]
#[command(name = "canopy")]
#[command(about = "Behavior graph engine", version)]
struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a demonstration graph until it settles
    Run {
        #[arg(value_enum)]
        scenario: Scenario,

        /// Seconds per tick
        #[arg(long)]
        dt: Option<f32>,

        /// Give up after this many ticks
        #[arg(long)]
        max_ticks: Option<u64>,

        /// Print lifecycle trace events as JSON lines
        #[arg(long)]
        trace: bool,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter))
    };
    if cli.log_json {
        fmt().json().with_env_filter(filter).with_target(false).init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }

    match cli.command {
        Commands::Run {
            scenario,
            dt,
            max_ticks,
            trace,
        } => run_scenario(config, scenario, dt, max_ticks, trace),
        Commands::Config => show_config(&config),
    }
}

fn run_scenario(
    mut config: EngineConfig,
    scenario: Scenario,
    dt: Option<f32>,
    max_ticks: Option<u64>,
    trace: bool,
) -> Result<()> {
    if let Some(dt) = dt {
        anyhow::ensure!(dt.is_finite() && dt >= 0.0, "--dt must be a finite, non-negative number");
        config.tick.dt_seconds = dt;
    }
    if let Some(max_ticks) = max_ticks {
        config.tick.max_ticks = max_ticks;
    }
    config.trace.enabled |= trace;

    tracing::info!(scenario = scenario.name(), dt = config.tick.dt_seconds, "Running scenario");

    let mut demo = scenario
        .build()
        .with_context(|| format!("Failed to build scenario {}", scenario.name()))?;
    demo.graph.apply_config(&config);
    demo.graph.start();

    if let Some(channel) = &demo.channel {
        let delivered = channel.emit(&());
        tracing::debug!(delivered, "Event emitted");
    }

    let status = demo.graph.run_until_quiescent(&config.tick)?;

    if config.trace.enabled {
        for module in demo.graph.modules() {
            let Some(log) = module.trace_log() else {
                continue;
            };
            for event in &log.events {
                println!("{}", serde_json::to_string(event)?);
            }
        }
    }

    println!("Scenario: {}", scenario.name());
    println!("Status:   {status}");
    println!("Ticks:    {}", demo.graph.clock().tick);
    if let Some(alarm) = demo.alarm {
        let value = demo.graph.value(alarm)?;
        println!("Alarm:    {value:?}");
    }
    Ok(())
}

fn show_config(config: &EngineConfig) -> Result<()> {
    print!("{}", config.to_yaml()?);
    Ok(())
}
