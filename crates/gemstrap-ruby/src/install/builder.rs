//! Prebuilt archives from ruby-builder and the `*-dev-builder` repositories

use std::path::{Path, PathBuf};

use gemstrap_core::{Platform, Result, SetupError};
use url::Url;

use super::download::{DownloadError, download_to_temp, extract_tar_gz};
use super::toolcache::{mark_complete, self_hosted_missing};
use super::{InstallRequest, InstalledRuntime, PrefixPlan, RuntimeInstaller, plan_prefix};
use crate::measure::measure;
use crate::resolve::ResolvedVersion;
use crate::version::Engine;

pub const RELEASES_URL: &str = "https://github.com/ruby/ruby-builder/releases";

/// Owner of the `<engine>-dev-builder` repositories
pub const DEV_BUILDERS_URL: &str = "https://github.com/ruby";

#[derive(Debug, Clone)]
pub struct BuilderInstaller {
    releases_url: String,
    dev_builders_url: String,
}

impl Default for BuilderInstaller {
    fn default() -> Self {
        Self::new()
    }
}

impl BuilderInstaller {
    pub fn new() -> Self {
        Self::with_base_urls(RELEASES_URL, DEV_BUILDERS_URL)
    }

    /// Points downloads somewhere else, e.g. a mirror or a test server
    pub fn with_base_urls(releases_url: impl Into<String>, dev_builders_url: impl Into<String>) -> Self {
        Self {
            releases_url: releases_url.into().trim_end_matches('/').to_string(),
            dev_builders_url: dev_builders_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn download_url(&self, resolved: &ResolvedVersion, platform: &Platform) -> Result<Url> {
        let engine = resolved.engine;
        let version = &resolved.version;
        let builder_platform = platform.builder_platform();

        let url = if resolved.is_head() {
            let repo = match engine {
                Engine::TruffleRubyGraalVM => "truffleruby-dev-builder".to_string(),
                _ => format!("{}-dev-builder", engine),
            };
            format!(
                "{}/{}/releases/latest/download/{}-{}-{}.tar.gz",
                self.dev_builders_url, repo, engine, version, builder_platform
            )
        } else {
            format!(
                "{}/download/{}-{}/{}-{}-{}.tar.gz",
                self.releases_url, engine, version, engine, version, builder_platform
            )
        };

        Url::parse(&url).map_err(|e| SetupError::DownloadFailed {
            url,
            reason: e.to_string(),
        })
    }

    /// `~/.rubies/<engine>-<version>`, or `C:\<engine>-<version>` on Windows
    fn default_prefix(request: &InstallRequest) -> PathBuf {
        let name = request.resolved.to_string();
        if request.platform.is_windows() {
            PathBuf::from(r"C:\").join(name)
        } else {
            request.home_dir.join(".rubies").join(name)
        }
    }

    fn download_and_extract(&self, request: &InstallRequest, prefix: &Path) -> Result<()> {
        let resolved = &request.resolved;
        let url = self.download_url(resolved, &request.platform)?;
        std::fs::create_dir_all(&request.temp_dir)?;

        let archive = measure("Downloading Ruby", request.grouped, || {
            tracing::info!("{}", url);
            download_to_temp(&url, Some(request.temp_dir.as_path())).map_err(|e| {
                if matches!(e, DownloadError::NotFound { .. }) {
                    SetupError::UnavailableBuild {
                        engine: resolved.engine.to_string(),
                        version: resolved.version.clone(),
                        platform: request.platform.name(),
                        cause: e.to_string(),
                    }
                } else {
                    e.into()
                }
            })
        })?;

        // The archive's top-level directory is named like the prefix
        let parent = prefix.parent().unwrap_or(prefix);
        measure("Extracting Ruby", request.grouped, || {
            extract_tar_gz(&archive, parent)
        })?;

        if !prefix.is_dir() {
            return Err(SetupError::Generic(format!(
                "Archive {} did not contain {}",
                url,
                prefix.display()
            )));
        }
        Ok(())
    }
}

impl RuntimeInstaller for BuilderInstaller {
    fn install(&self, request: &InstallRequest) -> Result<InstalledRuntime> {
        let resolved = &request.resolved;
        let (prefix, in_tool_cache) = match plan_prefix(request, || Self::default_prefix(request)) {
            PrefixPlan::Reuse(prefix) => {
                tracing::info!("Using {} from {}", resolved, prefix.display());
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

        if in_tool_cache {
            if let Some(reason) = &request.self_hosted {
                return Err(self_hosted_missing(resolved, &request.platform, &prefix, reason));
            }
        }

        super::with_install_lock(&prefix, &format!("install {}", resolved), || {
            if in_tool_cache && super::toolcache::complete_marker(&prefix).is_file() {
                tracing::info!("{} was installed by another job", resolved);
                return Ok(());
            }
            self.download_and_extract(request, &prefix)?;
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
