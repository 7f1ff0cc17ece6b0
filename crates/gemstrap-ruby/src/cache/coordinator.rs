//! Restore → install → clean → save
//!
//! Restore happens before the install step, cleanup and save after it, and
//! cleanup before save. The install step always runs, even on an exact hit:
//! it is cheap on a warm cache and lists what is installed.

use std::path::PathBuf;

use gemstrap_core::Result;
use serde::Serialize;

use super::backend::{BackendOp, CacheBackend, tolerate};
use super::key::is_exact_match;

/// The package-manager side of a cached install
pub trait DependencyInstaller {
    fn install(&self) -> Result<()>;

    /// Whether the installed dependencies satisfy the lockfile
    fn check(&self) -> Result<bool>;

    /// Removes installed packages the lockfile no longer references
    fn clean(&self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheKeys {
    pub full: String,
    pub restore_prefix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallOutcome {
    pub from_cache: bool,
    pub exact_hit: bool,
    pub cleaned: bool,
    pub saved: bool,
    pub restored_key: Option<String>,
}

pub struct CacheCoordinator<'a> {
    backend: &'a dyn CacheBackend,
    paths: Vec<PathBuf>,
    save_allowed: bool,
}

impl<'a> CacheCoordinator<'a> {
    pub fn new(backend: &'a dyn CacheBackend, paths: Vec<PathBuf>) -> Self {
        Self {
            backend,
            paths,
            save_allowed: true,
        }
    }

    /// Restore-only mode, for CI events whose results must not be saved
    pub fn save_allowed(mut self, allowed: bool) -> Self {
        self.save_allowed = allowed;
        self
    }

    /// Runs `installer` around the cache.
    ///
    /// `keys` is `None` when the project has no lockfile to key on; the
    /// backend is then never touched.
    pub fn install(
        &self,
        keys: Option<&CacheKeys>,
        installer: &dyn DependencyInstaller,
    ) -> Result<InstallOutcome> {
        let Some(keys) = keys else {
            tracing::info!("No lockfile to key the cache on, installing without cache");
            installer.install()?;
            return Ok(InstallOutcome::default());
        };

        tracing::info!("Cache key: {}", keys.full);
        let restore_keys = [keys.restore_prefix.clone()];
        let restored = tolerate(
            BackendOp::Restore,
            self.backend.restore(&self.paths, &keys.full, &restore_keys),
        )?
        .flatten();

        if let Some(restored) = &restored {
            tracing::info!("Found cache for key: {}", restored);
        }
        let exact_hit = is_exact_match(&keys.full, restored.as_deref());

        if exact_hit && !installer.check()? {
            tracing::info!("Restored dependencies do not satisfy the lockfile, reinstalling");
        }

        installer.install()?;

        let mut outcome = InstallOutcome {
            from_cache: restored.is_some(),
            exact_hit,
            restored_key: restored,
            ..InstallOutcome::default()
        };

        if outcome.from_cache && !exact_hit {
            installer.clean()?;
            outcome.cleaned = true;
        }

        if exact_hit {
            tracing::debug!("Exact cache hit, not saving");
        } else if !self.save_allowed {
            tracing::info!("Not saving the cache for this event");
        } else {
            tracing::info!("Saving cache");
            outcome.saved = tolerate(BackendOp::Save, self.backend.save(&self.paths, &keys.full))?
                .is_some();
        }

        Ok(outcome)
    }
}
