//! Catalog of prebuilt runtime versions
//!
//! Two embedded data files back the catalog:
//!
//! - `ruby-builder-versions.json`: engine → versions (oldest → newest,
//!   head-like entries last), built by ruby-builder for Linux and macOS, and
//!   used on Windows for engines other than CRuby.
//! - `windows-versions.json`: RubyInstaller archives for CRuby on Windows,
//!   one URL per architecture.
//!
//! The catalog is loaded once and never mutated.

use std::collections::{BTreeMap, HashSet};

use gemstrap_core::{Arch, Platform, Result, SetupError};
use serde::{Deserialize, Serialize};

use crate::version::Engine;

pub const RUBY_BUILDER_VERSIONS: &str = include_str!("../data/ruby-builder-versions.json");
pub const WINDOWS_VERSIONS: &str = include_str!("../data/windows-versions.json");

/// One RubyInstaller release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowsRelease {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arm64: Option<String>,
}

impl WindowsRelease {
    pub fn url_for(&self, arch: Arch) -> Option<&str> {
        match arch {
            Arch::X64 => self.x64.as_deref(),
            Arch::Arm64 => self.arm64.as_deref(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VersionCatalog {
    builder: BTreeMap<String, Vec<String>>,
    windows: Vec<WindowsRelease>,
}

impl VersionCatalog {
    /// Catalog compiled into the binary
    pub fn embedded() -> Result<Self> {
        Self::from_json(RUBY_BUILDER_VERSIONS, WINDOWS_VERSIONS)
    }

    pub fn from_json(builder_json: &str, windows_json: &str) -> Result<Self> {
        let builder: BTreeMap<String, Vec<String>> = serde_json::from_str(builder_json)?;
        let windows: Vec<WindowsRelease> = serde_json::from_str(windows_json)?;
        Self::new(builder, windows)
    }

    pub fn new(builder: BTreeMap<String, Vec<String>>, windows: Vec<WindowsRelease>) -> Result<Self> {
        for (engine, versions) in &builder {
            if let Some(duplicate) = find_duplicate(versions.iter().map(String::as_str)) {
                return Err(SetupError::Generic(format!(
                    "duplicate version {} for {} in ruby-builder catalog",
                    duplicate, engine
                )));
            }
        }
        if let Some(duplicate) = find_duplicate(windows.iter().map(|r| r.version.as_str())) {
            return Err(SetupError::Generic(format!(
                "duplicate version {} in windows catalog",
                duplicate
            )));
        }

        Ok(Self { builder, windows })
    }

    /// Ordered versions available for `engine` on `platform`.
    ///
    /// `None` means the engine is unknown on this platform.
    pub fn available_versions(&self, platform: &Platform, engine: &str) -> Option<Vec<String>> {
        if platform.is_windows() && engine == Engine::Ruby.as_str() {
            return Some(
                self.windows
                    .iter()
                    .filter(|release| release.url_for(platform.arch).is_some())
                    .map(|release| release.version.clone())
                    .collect(),
            );
        }
        self.builder.get(engine).cloned()
    }

    /// RubyInstaller archive URL for a CRuby version on Windows
    pub fn windows_url(&self, version: &str, arch: Arch) -> Option<&str> {
        self.windows
            .iter()
            .find(|release| release.version == version)
            .and_then(|release| release.url_for(arch))
    }

    pub fn engines(&self) -> impl Iterator<Item = &str> {
        self.builder.keys().map(String::as_str)
    }
}

fn find_duplicate<'a>(versions: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = HashSet::new();
    versions.into_iter().find(|version| !seen.insert(*version))
}
