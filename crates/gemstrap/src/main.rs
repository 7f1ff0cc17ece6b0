mod cli;
mod commands;
mod context;
mod output;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

/// Log filter variable; `--verbose` only applies when it is unset
const LOG_ENV: &str = "GEMSTRAP_LOG";

fn initialize_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout carries command output and shell exports
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    initialize_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Setup(args) => commands::setup::run(&args),
        Commands::Resolve { spec, json } => commands::resolve::run(&spec, json),
        Commands::Versions { engine, json } => commands::versions::run(engine.as_deref(), json),
        Commands::CacheKey {
            input,
            cache_version,
            json,
        } => commands::cache_key::run(&input, cache_version, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
