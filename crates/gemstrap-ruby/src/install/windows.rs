//! RubyInstaller builds for CRuby on Windows
//!
//! Archives are `.7z`, extracted with the runner image's `7z` into the temp
//! directory and then moved, or linked across volumes, into place. MSYS2 and
//! compiler toolchains are not installed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use gemstrap_core::{Result, SetupError};
use url::Url;

use super::download::download_to_temp;
use super::toolcache::mark_complete;
use super::{InstallRequest, InstalledRuntime, PrefixPlan, RuntimeInstaller, plan_prefix};
use crate::catalog::VersionCatalog;
use crate::measure::measure;
use crate::runner::{CommandRunner, CommandSpec};

pub struct WindowsInstaller<'a> {
    catalog: &'a VersionCatalog,
    runner: &'a dyn CommandRunner,
}

impl<'a> WindowsInstaller<'a> {
    pub fn new(catalog: &'a VersionCatalog, runner: &'a dyn CommandRunner) -> Self {
        Self { catalog, runner }
    }

    fn archive_url(&self, request: &InstallRequest) -> Result<String> {
        let resolved = &request.resolved;
        let url = self
            .catalog
            .windows_url(&resolved.version, request.platform.arch)
            .ok_or_else(|| SetupError::UnavailableBuild {
                engine: resolved.engine.to_string(),
                version: resolved.version.clone(),
                platform: request.platform.id(),
                cause: "no RubyInstaller build for this architecture".to_string(),
            })?;

        if !url.ends_with(".7z") {
            return Err(SetupError::DownloadFailed {
                url: url.to_string(),
                reason: "URL should end in .7z".to_string(),
            });
        }
        Ok(url.to_string())
    }

    fn download_and_extract(
        &self,
        request: &InstallRequest,
        url: &str,
        base: &str,
        prefix: &Path,
    ) -> Result<()> {
        let parsed = Url::parse(url).map_err(|e| SetupError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        fs::create_dir_all(&request.temp_dir)?;

        let archive = measure("Downloading Ruby", request.grouped, || {
            tracing::info!("{}", url);
            download_to_temp(&parsed, Some(request.temp_dir.as_path()))
        })?;

        let extract = sevenzip_extract(&archive, base, &request.temp_dir);
        measure("Extracting Ruby", request.grouped, || {
            self.runner.run_checked(&extract)
        })?;

        if let Some(parent) = prefix.parent() {
            fs::create_dir_all(parent)?;
        }
        move_into_place(&request.temp_dir.join(base), prefix, |from, to| fs::rename(from, to))
    }
}

/// Moves an extracted tree to `prefix`. The runner's temp directory is often
/// on another volume than the prefix; the tree is then linked in place
/// instead.
fn move_into_place(
    extracted: &Path,
    prefix: &Path,
    rename: impl FnOnce(&Path, &Path) -> io::Result<()>,
) -> Result<()> {
    match rename(extracted, prefix) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::info!(
                "Linking {} to {} across volumes",
                prefix.display(),
                extracted.display()
            );
            link_dir(extracted, prefix)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(windows)]
fn link_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

#[cfg(unix)]
fn link_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

/// `7z x` excluding the bundled documentation
pub fn sevenzip_extract(archive: &Path, base: &str, dest: &Path) -> CommandSpec {
    CommandSpec::new("7z")
        .arg("x")
        .arg(archive.to_string_lossy())
        .arg("-bd")
        .arg(format!(r"-xr!{}\share\doc", base))
        .arg(format!("-o{}", dest.display()))
        .capture()
}

/// `rubyinstaller-3.3.6-1-x64` for `.../rubyinstaller-3.3.6-1-x64.7z`
pub fn archive_base(url: &str) -> &str {
    let file = url.rsplit('/').next().unwrap_or(url);
    file.strip_suffix(".7z").unwrap_or(file)
}

impl RuntimeInstaller for WindowsInstaller<'_> {
    fn install(&self, request: &InstallRequest) -> Result<InstalledRuntime> {
        let url = self.archive_url(request)?;
        let base = archive_base(&url);

        let (prefix, in_tool_cache) =
            match plan_prefix(request, || PathBuf::from(r"C:\").join(base)) {
                PrefixPlan::Reuse(prefix) => {
                    tracing::info!("Using {} from {}", request.resolved, prefix.display());
                    return Ok(InstalledRuntime {
                        bin_dirs: vec![prefix.join("bin")],
                        prefix,
                        reused: true,
                    });
                }
                PrefixPlan::Fresh {
                    prefix,
                    in_tool_cache,
                } => (prefix, in_tool_cache),
            };

        super::with_install_lock(&prefix, &format!("install {}", request.resolved), || {
            if in_tool_cache && super::toolcache::complete_marker(&prefix).is_file() {
                return Ok(());
            }
            self.download_and_extract(request, &url, base, &prefix)?;
            if in_tool_cache {
                mark_complete(&prefix)?;
            }
            Ok(())
        })?;

        Ok(InstalledRuntime {
            bin_dirs: vec![prefix.join("bin")],
            prefix,
            reused: false,
        })
    }
}
