//! Runner tool cache layout
//!
//! `<root>/<Ruby|JRuby|...>/<version>/<arch>` plus a sibling
//! `<arch>.complete` marker written once the tree is fully extracted.

use std::fs;
use std::path::{Path, PathBuf};

use gemstrap_core::{Arch, OsFamily, Platform, Result, SetupError};

use crate::resolve::ResolvedVersion;
use crate::version::Engine;

/// Tool cache locations of GitHub-hosted images
fn hosted_root(os: OsFamily) -> &'static str {
    match os {
        OsFamily::Ubuntu => "/opt/hostedtoolcache",
        OsFamily::MacOS => "/Users/runner/hostedtoolcache",
        OsFamily::Windows => "C:/hostedtoolcache/windows",
    }
}

/// Non-head CRuby builds are relocatable; everything installs into the tool
/// cache on self-hosted runners.
pub fn should_use_tool_cache(resolved: &ResolvedVersion, self_hosted: bool) -> bool {
    (resolved.engine == Engine::Ruby && !resolved.is_head()) || self_hosted
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCache {
    root: PathBuf,
}

impl ToolCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Picks the root: configuration, then `$RUNNER_TOOL_CACHE`, then the
    /// hosted image default. Self-hosted runners have no default.
    pub fn locate(
        configured: Option<&Path>,
        runner_tool_cache: Option<&str>,
        platform: &Platform,
        self_hosted: bool,
    ) -> Result<Self> {
        if let Some(root) = configured {
            return Ok(Self::new(root));
        }
        if let Some(root) = runner_tool_cache {
            return Ok(Self::new(root));
        }
        if self_hosted {
            return Err(SetupError::ConfigInvalidValue {
                field: "runner.tool_cache".to_string(),
                reason: "$RUNNER_TOOL_CACHE must be set on self-hosted runners".to_string(),
            });
        }
        Ok(Self::new(hosted_root(platform.os)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn prefix(&self, engine: Engine, version: &str, arch: Arch) -> PathBuf {
        self.root
            .join(engine.tool_cache_name())
            .join(version)
            .join(arch.as_str())
    }

    /// The prefix, if a complete install is already there
    pub fn find(&self, engine: Engine, version: &str, arch: Arch) -> Option<PathBuf> {
        let prefix = self.prefix(engine, version, arch);
        (prefix.is_dir() && complete_marker(&prefix).is_file()).then_some(prefix)
    }
}

pub fn complete_marker(prefix: &Path) -> PathBuf {
    let mut marker = prefix.as_os_str().to_owned();
    marker.push(".complete");
    PathBuf::from(marker)
}

pub fn mark_complete(prefix: &Path) -> Result<()> {
    fs::write(complete_marker(prefix), "")?;
    Ok(())
}

/// Instructions for provisioning a runtime on a self-hosted runner
pub fn self_hosted_missing(
    resolved: &ResolvedVersion,
    platform: &Platform,
    prefix: &Path,
    reason: &str,
) -> SetupError {
    let definition = match resolved.engine {
        Engine::Ruby => resolved.version.clone(),
        _ => resolved.to_string(),
    };
    SetupError::SelfHostedRuntimeMissing(format!(
        "The current runner ({}) was detected as self-hosted because {}.\n\
         In such a case, you should install Ruby in the $RUNNER_TOOL_CACHE yourself, for example using https://github.com/rbenv/ruby-build\n\
         $ ruby-build {} {}\n\
         Once that completes successfully, mark it as complete with:\n\
         $ touch {}\n\
         It is your responsibility to ensure installing Ruby like that is not done in parallel.",
        platform.id(),
        reason,
        definition,
        prefix.display(),
        complete_marker(prefix).display()
    ))
}
