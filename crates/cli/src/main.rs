//! Smokefleet CLI entry point
//!
//! Drives browser smoke checks across the service fleet. Exit codes:
//! 0 when everything passed, 1 when checks failed or services were
//! unreachable, 2 when the harness itself could not run.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

use commands::{auth, doctor, probe, run, services};

/// Browser smoke tests for a self-hosted service fleet
#[derive(Parser)]
#[command(name = "smokefleet")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file (default: smokefleet.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Env file with credentials (default: .env when present)
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run smoke checks against the fleet
    Run(run::RunArgs),

    /// Capture or refresh session snapshots, nothing else
    Auth(auth::AuthArgs),

    /// Probe reachability without opening a browser
    Probe(probe::ProbeArgs),

    /// List the built-in service fleet
    Services,

    /// Check that this environment can run the fleet
    Doctor,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // credentials come from the environment, so the env file loads before
    // anything reads it (including RUST_LOG)
    match &cli.env_file {
        Some(path) => {
            if let Err(e) = dotenvy::from_path(path) {
                output::print_error(&format!("cannot load {}: {}", path.display(), e));
                std::process::exit(2);
            }
        }
        None => {
            let _ = dotenvy::dotenv();
        }
    }

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let config = match smokefleet_common::HarnessConfig::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            output::print_error(&format!("config: {}", e));
            std::process::exit(2);
        }
    };

    let result = match cli.command {
        Commands::Run(args) => run::execute(args, config, cli.format).await,
        Commands::Auth(args) => auth::execute(args, config, cli.format).await,
        Commands::Probe(args) => probe::execute(args, config, cli.format).await,
        Commands::Services => services::execute(config, cli.format),
        Commands::Doctor => doctor::execute(config, cli.format),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            std::process::exit(2);
        }
    }
}
