//! Layered inputs for CLI commands
//!
//! Defaults, then `gemstrap.toml` in the working directory, then flags.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::Result;
use gemstrap_core::config::Config;
use gemstrap_ruby::SetupOptions;

use crate::cli::{InputArgs, SetupArgs};

/// Configuration of one invocation
pub struct Context {
    /// Directory `gemstrap.toml` was looked up in
    pub base_dir: PathBuf,
    pub config: Config,
}

impl Context {
    /// Loads `gemstrap.toml` and applies the shared input flags
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The current directory cannot be determined
    /// - The config file cannot be parsed or holds invalid values
    pub fn new(input: &InputArgs) -> Result<Self> {
        let base_dir = match &input.working_directory {
            Some(dir) => absolute(dir)?,
            None => env::current_dir()?,
        };

        let mut config = Config::load_or_default(&base_dir)?;
        if let Some(version) = &input.ruby_version {
            config.ruby.version = version.clone();
        }
        if let Some(version) = &input.bundler {
            config.bundler.version = version.clone();
        }

        Ok(Self { base_dir, config })
    }

    /// [`Context::new`] plus the setup-only flags
    pub fn for_setup(args: &SetupArgs) -> Result<Self> {
        let mut ctx = Self::new(&args.input)?;
        if args.bundler_cache {
            ctx.config.bundler.cache = true;
        }
        if let Some(version) = &args.rubygems {
            ctx.config.rubygems.version = version.clone();
        }
        if let Some(version) = &args.cache_version {
            ctx.config.cache.version = version.clone();
        }
        if let Some(dir) = &args.cache_dir {
            ctx.config.runner.cache_dir = Some(absolute(dir)?);
        }
        if args.self_hosted {
            ctx.config.runner.self_hosted = Some(true);
        }
        Ok(ctx)
    }

    /// Validated run options
    pub fn options(&self) -> Result<SetupOptions> {
        self.config.validate()?;
        Ok(SetupOptions::from_config(&self.config, &self.base_dir)?)
    }

    /// Root of the local cache backend
    pub fn cache_dir(&self) -> PathBuf {
        match &self.config.runner.cache_dir {
            Some(dir) => self.base_dir.join(dir),
            None => dirs::cache_dir()
                .unwrap_or_else(env::temp_dir)
                .join("gemstrap"),
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}
