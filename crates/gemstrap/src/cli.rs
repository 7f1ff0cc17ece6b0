//! CLI command structure using clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gemstrap")]
#[command(version, about = "Installs a Ruby runtime, Bundler and cached gems for CI", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install Ruby, Bundler and the project's gems
    Setup(SetupArgs),

    /// Resolve a version spec against the catalog without installing
    Resolve {
        /// e.g. "3.3", "jruby", "truffleruby-24.1.2"
        spec: String,

        #[arg(long)]
        json: bool,
    },

    /// List catalogued versions available on this platform
    Versions {
        /// Only list this engine
        engine: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Print the bundle cache keys of the project
    CacheKey {
        #[command(flatten)]
        input: InputArgs,

        /// Cache namespace token
        #[arg(long, env = "GEMSTRAP_CACHE_VERSION")]
        cache_version: Option<String>,

        #[arg(long)]
        json: bool,
    },
}

/// Inputs shared by every command that reads the project
#[derive(Args, Debug, Clone, Default)]
pub struct InputArgs {
    /// Runtime version, ".ruby-version", ".tool-versions" or "default"
    #[arg(long, env = "GEMSTRAP_RUBY_VERSION")]
    pub ruby_version: Option<String>,

    /// "Gemfile.lock", "default", "latest", "none" or a version
    #[arg(long, env = "GEMSTRAP_BUNDLER")]
    pub bundler: Option<String>,

    /// Directory holding the Gemfile and gemstrap.toml
    #[arg(long, env = "GEMSTRAP_WORKING_DIRECTORY")]
    pub working_directory: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SetupArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Run `bundle install` and cache the installed gems
    #[arg(long, env = "GEMSTRAP_BUNDLER_CACHE")]
    pub bundler_cache: bool,

    /// "default", "latest" or a version
    #[arg(long, env = "GEMSTRAP_RUBYGEMS")]
    pub rubygems: Option<String>,

    /// Cache namespace token
    #[arg(long, env = "GEMSTRAP_CACHE_VERSION")]
    pub cache_version: Option<String>,

    /// Root of the local cache backend
    #[arg(long, env = "GEMSTRAP_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Treat the runner as self-hosted
    #[arg(long, env = "GEMSTRAP_SELF_HOSTED")]
    pub self_hosted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_setup_flags_parse() {
        let cli = Cli::try_parse_from([
            "gemstrap",
            "setup",
            "--ruby-version",
            "3.3",
            "--bundler-cache",
            "--cache-dir",
            "/tmp/cache",
        ])
        .unwrap();

        let Commands::Setup(args) = cli.command else {
            panic!("expected setup");
        };
        assert_eq!(args.input.ruby_version.as_deref(), Some("3.3"));
        assert!(args.bundler_cache);
        assert_eq!(args.cache_dir, Some(PathBuf::from("/tmp/cache")));
        assert!(!args.self_hosted);
    }

    #[test]
    fn test_versions_engine_is_optional() {
        let cli = Cli::try_parse_from(["gemstrap", "versions", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Versions {
                engine: None,
                json: true
            }
        ));
    }
}
