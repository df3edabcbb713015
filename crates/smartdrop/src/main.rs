//! smartdrop - floating menu overlay engine
//!
//! Command line front end: configuration checks and headless replay of
//! scripted interactions.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};

use smartdrop::replay::{self, Script};
use smartdrop_core::{Config, logging};

/// smartdrop - floating menu overlay engine
#[derive(Parser, Debug)]
#[command(name = "smartdrop", version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (uses XDG lookup if not specified)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print example configuration and exit
    #[arg(long)]
    print_example_config: bool,

    /// Validate configuration and exit (returns non-zero on errors)
    #[arg(long)]
    check_config: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a scripted interaction against an in-memory host
    Replay {
        /// Script file (TOML)
        script: PathBuf,
        /// Emit snapshots as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print the resolved configuration summary
    Summary,
}

fn main() -> ExitCode {
    let args = Args::parse();

    logging::init(args.verbose);

    // --print-example-config needs no config at all
    if args.print_example_config {
        print!("{}", smartdrop_core::config::DEFAULT_CONFIG_TOML);
        return ExitCode::SUCCESS;
    }

    // If --config is specified, it must exist and be valid (no fallback)
    let load_result = match Config::find_and_load(args.config.as_deref()) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(ref source) = load_result.source {
        info!("Loaded configuration from {:?}", source);
    } else if load_result.used_defaults {
        debug!("Using default configuration (no config file found)");
    }

    let config = load_result.config;

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }
    for warning in config.warnings() {
        warn!("{}", warning);
    }

    if args.check_config {
        if let Some(ref source) = load_result.source {
            println!("Configuration valid: {}", source.display());
        } else {
            println!("Configuration valid (using defaults)");
        }
        return ExitCode::SUCCESS;
    }

    match args.command {
        Some(Command::Replay { script, json }) => match run_replay(&script, &config, json) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                ExitCode::FAILURE
            }
        },
        Some(Command::Summary) | None => {
            println!("{}", config.summary());
            ExitCode::SUCCESS
        }
    }
}

fn run_replay(path: &Path, config: &Config, json: bool) -> anyhow::Result<()> {
    let script = Script::load(path)?;
    info!("Replaying {} steps from {}", script.steps.len(), path.display());

    let snapshots = replay::run(&script, config)
        .with_context(|| format!("replay of {} failed", path.display()))?;

    if json {
        let out = serde_json::to_string_pretty(&snapshots).context("serializing snapshots")?;
        println!("{}", out);
    } else {
        for snapshot in &snapshots {
            println!("{}", snapshot);
        }
    }
    Ok(())
}
