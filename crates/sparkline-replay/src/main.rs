//! Command-line driver for the Sparkline plugin host.
//!
//! Loads a plugin directory from a host config, then feeds it either a
//! recorded JSON-lines tick stream or a seeded synthetic match and prints a
//! summary of what the plugins emitted.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod replay;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sparkline_core::state::{FieldInfo, GameTickPacket};
use sparkline_core::synthetic::SyntheticMatch;
use sparkline_core::{Host, HostConfig, PluginCatalog};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Replay a recorded tick stream
    Run {
        /// Host config file
        #[arg(long)]
        config: PathBuf,
        /// JSON-lines file, one frame per tick
        #[arg(long)]
        ticks: PathBuf,
    },
    /// Drive the host with a seeded synthetic match
    Synthetic {
        /// Host config file
        #[arg(long)]
        config: PathBuf,
        /// Number of ticks to run
        #[arg(long, default_value_t = 1200)]
        ticks: u64,
        /// Generator seed
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Cars per team
        #[arg(long, default_value_t = 1)]
        players: usize,
    },
    /// Evaluate a condition expression against one packet
    Eval {
        /// Condition source
        expression: String,
        /// JSON packet file; an empty packet when omitted
        #[arg(long)]
        packet: Option<PathBuf>,
        /// Host config supplying the local player
        #[arg(long)]
        config: Option<PathBuf>,
        /// Bind `field_info` to the standard arena
        #[arg(long)]
        standard_field: bool,
    },
}

fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

fn load_config(path: &Path) -> Result<HostConfig> {
    HostConfig::from_file(path).with_context(|| format!("failed to load {}", path.display()))
}

fn start_host(config: HostConfig) -> Result<Host> {
    init_tracing(&config.log_filter);
    let mut host = Host::new(config, PluginCatalog::with_builtins());
    let report = host.load().context("failed to load plugins")?;
    for error in &report.skipped {
        warn!(%error, "plugin skipped");
    }
    info!(loaded = report.loaded.len(), skipped = report.skipped.len(), "host ready");
    Ok(host)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, ticks } => {
            let mut host = start_host(load_config(&config)?)?;
            let file = File::open(&ticks)
                .with_context(|| format!("failed to open {}", ticks.display()))?;
            let frames = replay::read_frames(BufReader::new(file))
                .with_context(|| format!("failed to read {}", ticks.display()))?;
            info!(frames = frames.len(), "replaying");
            let summary = replay::replay(&mut host, &frames);
            host.shutdown();
            println!("{summary}");
        }
        Commands::Synthetic {
            config,
            ticks,
            seed,
            players,
        } => {
            let mut host = start_host(load_config(&config)?)?;
            let mut game = SyntheticMatch::new(seed, players);
            info!(seed, players, ticks, "running synthetic match");
            let summary = replay::synthetic(&mut host, &mut game, ticks);
            host.shutdown();
            println!("{summary}");
        }
        Commands::Eval {
            expression,
            packet,
            config,
            standard_field,
        } => {
            let config = match config {
                Some(path) => load_config(&path)?,
                None => HostConfig::default(),
            };
            init_tracing(&config.log_filter);
            let packet: GameTickPacket = match packet {
                Some(path) => {
                    let file = File::open(&path)
                        .with_context(|| format!("failed to open {}", path.display()))?;
                    serde_json::from_reader(BufReader::new(file))
                        .with_context(|| format!("{} is not a valid packet", path.display()))?
                }
                None => GameTickPacket::default(),
            };
            let field = standard_field.then(FieldInfo::standard);
            let value =
                replay::evaluate_condition(&config, &packet, field.as_ref(), &expression)?;
            println!("{}", serde_json::to_string(&value)?);
        }
    }

    Ok(())
}
