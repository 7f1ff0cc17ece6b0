//! Sentinel input tokens, decoded once into closed enums
//!
//! Past this boundary nothing compares raw input strings.

use std::fmt;

use super::consts::version_files;
use crate::error::{Result, SetupError};
use crate::lockfile::is_valid_bundler_version;

/// What the user asked for as the runtime version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRequest {
    /// `default`: `.ruby-version`, then `.tool-versions`
    ProjectDefault,
    /// `.ruby-version`
    RubyVersionFile,
    /// `.tool-versions`
    ToolVersionsFile,
    /// Anything else, passed to the resolver as-is
    Literal(String),
}

impl VersionRequest {
    pub fn parse(input: &str) -> Self {
        match input.trim() {
            "default" => VersionRequest::ProjectDefault,
            version_files::RUBY_VERSION => VersionRequest::RubyVersionFile,
            version_files::TOOL_VERSIONS => VersionRequest::ToolVersionsFile,
            other => VersionRequest::Literal(other.to_string()),
        }
    }
}

/// Requested Bundler version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundlerRequest {
    /// Use the `BUNDLED WITH` version of the lockfile, else `Default`
    Lockfile,
    /// Whatever ships with the runtime when recent enough
    Default,
    Latest,
    /// Do not install Bundler
    None,
    /// Explicit 1-3 component version
    Version(String),
}

impl BundlerRequest {
    pub fn parse(input: &str) -> Result<Self> {
        match input.trim() {
            "Gemfile.lock" | "gems.locked" => Ok(BundlerRequest::Lockfile),
            "default" => Ok(BundlerRequest::Default),
            "latest" => Ok(BundlerRequest::Latest),
            "none" => Ok(BundlerRequest::None),
            other if is_valid_bundler_version(other) => {
                Ok(BundlerRequest::Version(other.to_string()))
            }
            other => Err(SetupError::MalformedAuxVersionInput {
                tool: "bundler".to_string(),
                input: other.to_string(),
            }),
        }
    }

    /// Sentinels that defer to the Bundler a RubyGems update brings along
    pub fn defers_to_rubygems(&self) -> bool {
        matches!(self, BundlerRequest::Default | BundlerRequest::Lockfile)
    }
}

impl fmt::Display for BundlerRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundlerRequest::Lockfile => f.write_str("Gemfile.lock"),
            BundlerRequest::Default => f.write_str("default"),
            BundlerRequest::Latest => f.write_str("latest"),
            BundlerRequest::None => f.write_str("none"),
            BundlerRequest::Version(v) => f.write_str(v),
        }
    }
}

/// Requested RubyGems version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RubygemsRequest {
    Default,
    Latest,
    Version(semver::Version),
}

impl RubygemsRequest {
    pub fn parse(input: &str) -> Result<Self> {
        match input.trim() {
            "default" => Ok(RubygemsRequest::Default),
            "latest" => Ok(RubygemsRequest::Latest),
            other => semver::Version::parse(other)
                .map(RubygemsRequest::Version)
                .map_err(|_| SetupError::MalformedAuxVersionInput {
                    tool: "rubygems".to_string(),
                    input: other.to_string(),
                }),
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, RubygemsRequest::Default)
    }
}
