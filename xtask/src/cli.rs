use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Gemstrap automation tasks", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Version catalog maintenance
    Catalog(CatalogArgs),
}

#[derive(Parser)]
pub struct CatalogArgs {
    /// Directory holding ruby-builder-versions.json and windows-versions.json
    #[arg(long, global = true, default_value = "crates/gemstrap-ruby/data")]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: CatalogCommands,
}

#[derive(Subcommand)]
pub enum CatalogCommands {
    /// Add released versions, e.g. "ruby-3.4.8,jruby-10.0.3.0"
    AddVersion {
        versions: String,
    },
    /// Check the catalog files for duplicates and misplaced entries
    Verify,
    /// Print the CI test matrix as JSON
    Matrix,
}
