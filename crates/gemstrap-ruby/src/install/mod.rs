//! Runtime installation
//!
//! Prebuilt archives come from ruby-builder on every platform except CRuby
//! on Windows, which uses RubyInstaller builds.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gemstrap_core::lock::acquire_lock;
use gemstrap_core::{Platform, Result};
use serde::Serialize;

use crate::resolve::ResolvedVersion;
use crate::version::Engine;

pub mod builder;
pub mod download;
pub mod java;
pub mod toolcache;
pub mod windows;

pub use builder::BuilderInstaller;
pub use toolcache::{ToolCache, should_use_tool_cache};
pub use windows::WindowsInstaller;

/// How long to wait for a concurrent job installing the same runtime
pub const INSTALL_LOCK_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub resolved: ResolvedVersion,
    pub platform: Platform,
    /// Set when the runtime belongs in the tool cache
    pub tool_cache: Option<ToolCache>,
    /// Why the runner is self-hosted, if it is
    pub self_hosted: Option<String>,
    pub home_dir: PathBuf,
    /// Scratch space for downloads and extraction
    pub temp_dir: PathBuf,
    /// Emit CI log groups around slow stages
    pub grouped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledRuntime {
    pub prefix: PathBuf,
    /// Directories to prepend to PATH, in order
    pub bin_dirs: Vec<PathBuf>,
    /// Already present, nothing was downloaded
    pub reused: bool,
}

pub trait RuntimeInstaller {
    fn install(&self, request: &InstallRequest) -> Result<InstalledRuntime>;
}

/// Where a runtime goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefixPlan {
    /// A complete install already exists
    Reuse(PathBuf),
    Fresh { prefix: PathBuf, in_tool_cache: bool },
}

/// Tool cache prefix when the request has a tool cache, `fallback`
/// otherwise.
pub fn plan_prefix(request: &InstallRequest, fallback: impl FnOnce() -> PathBuf) -> PrefixPlan {
    let resolved = &request.resolved;
    match &request.tool_cache {
        Some(tool_cache) => {
            match tool_cache.find(resolved.engine, &resolved.version, request.platform.arch) {
                Some(found) => PrefixPlan::Reuse(found),
                None => PrefixPlan::Fresh {
                    prefix: tool_cache.prefix(
                        resolved.engine,
                        &resolved.version,
                        request.platform.arch,
                    ),
                    in_tool_cache: true,
                },
            }
        }
        None => PrefixPlan::Fresh {
            prefix: fallback(),
            in_tool_cache: false,
        },
    }
}

/// Serializes installs into `prefix` across processes.
///
/// `f` runs with the lock held; it should recheck whether another job
/// finished the install in the meantime.
pub fn with_install_lock<T>(
    prefix: &Path,
    description: &str,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    if let Some(parent) = prefix.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut lock_path = prefix.as_os_str().to_owned();
    lock_path.push(".lock");

    let _guard = acquire_lock(Path::new(&lock_path), INSTALL_LOCK_TIMEOUT, description)?;
    f()
}

/// Picks the installer for the platform and engine
pub struct PlatformInstaller<'a> {
    builder: BuilderInstaller,
    windows: WindowsInstaller<'a>,
}

impl<'a> PlatformInstaller<'a> {
    pub fn new(builder: BuilderInstaller, windows: WindowsInstaller<'a>) -> Self {
        Self { builder, windows }
    }
}

impl RuntimeInstaller for PlatformInstaller<'_> {
    fn install(&self, request: &InstallRequest) -> Result<InstalledRuntime> {
        if request.platform.is_windows() && request.resolved.engine == Engine::Ruby {
            self.windows.install(request)
        } else {
            self.builder.install(request)
        }
    }
}
