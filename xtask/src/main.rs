mod cli;
mod commands;

use crate::cli::{CatalogCommands, Cli, Commands};
use crate::commands::catalog::{CatalogAction, CatalogCommand};
use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Catalog(args) => {
            let action = match args.command {
                CatalogCommands::AddVersion { versions } => CatalogAction::AddVersion {
                    versions: versions
                        .split(',')
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .map(String::from)
                        .collect(),
                },
                CatalogCommands::Verify => CatalogAction::Verify,
                CatalogCommands::Matrix => CatalogAction::Matrix,
            };
            let cmd = CatalogCommand::new(args.data_dir, action);
            use crate::commands::Command as _;
            cmd.run()?;
        }
    }

    Ok(())
}
