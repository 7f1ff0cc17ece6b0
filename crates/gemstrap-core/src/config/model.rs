use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::consts::{
    CONFIG_FILE_NAME, DEFAULT_BUNDLER_INPUT, DEFAULT_CACHE_VERSION, DEFAULT_RUBY_INPUT,
    DEFAULT_RUBYGEMS_INPUT,
};

/// gemstrap.toml schema
///
/// Every section is optional; CLI flags and `GEMSTRAP_*` variables are
/// layered on top by the binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ruby: RubyConfig,
    #[serde(default)]
    pub bundler: BundlerConfig,
    #[serde(default)]
    pub rubygems: RubygemsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RubyConfig {
    #[serde(default = "default_ruby_version")]
    pub version: String,
}

impl Default for RubyConfig {
    fn default() -> Self {
        Self {
            version: default_ruby_version(),
        }
    }
}

fn default_ruby_version() -> String {
    DEFAULT_RUBY_INPUT.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundlerConfig {
    #[serde(default = "default_bundler_version")]
    pub version: String,
    /// Run `bundle install` and cache installed gems
    #[serde(default)]
    pub cache: bool,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            version: default_bundler_version(),
            cache: false,
        }
    }
}

fn default_bundler_version() -> String {
    DEFAULT_BUNDLER_INPUT.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RubygemsConfig {
    #[serde(default = "default_rubygems_version")]
    pub version: String,
}

impl Default for RubygemsConfig {
    fn default() -> Self {
        Self {
            version: default_rubygems_version(),
        }
    }
}

fn default_rubygems_version() -> String {
    DEFAULT_RUBYGEMS_INPUT.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Namespace token; changing it invalidates every previous entry
    #[serde(default = "default_cache_version")]
    pub version: String,
    /// CI event names for which the cache is restored but never saved
    #[serde(default = "default_no_save_events")]
    pub no_save_events: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version: default_cache_version(),
            no_save_events: default_no_save_events(),
        }
    }
}

fn default_cache_version() -> String {
    DEFAULT_CACHE_VERSION.to_string()
}

fn default_no_save_events() -> Vec<String> {
    vec!["merge_group".to_string()]
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
    /// Autodetected from the runner environment when absent
    #[serde(default)]
    pub self_hosted: Option<bool>,
    /// Falls back to $RUNNER_TOOL_CACHE
    #[serde(default)]
    pub tool_cache: Option<PathBuf>,
    /// Root of the local cache backend
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Config {
    /// Reads a gemstrap.toml file
    pub fn from_file(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| crate::error::SetupError::ConfigParse(e.to_string()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| crate::error::SetupError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `gemstrap.toml` from `dir` if present, defaults otherwise
    pub fn load_or_default(dir: &Path) -> crate::error::Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.is_file() {
            tracing::debug!("Loading configuration from {}", path.display());
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.ruby.version.trim().is_empty() {
            return Err(crate::error::SetupError::ConfigInvalidValue {
                field: "ruby.version".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.cache.version.trim().is_empty() {
            return Err(crate::error::SetupError::ConfigInvalidValue {
                field: "cache.version".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
