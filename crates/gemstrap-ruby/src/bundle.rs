//! Bundler installation, project configuration and `bundle install`

use std::path::{Path, PathBuf};

use gemstrap_core::Result;
use gemstrap_core::lockfile::Gemfiles;

use crate::cache::DependencyInstaller;
use crate::env::EnvOverlay;
use crate::measure::measure;
use crate::policy::BundlerDecision;
use crate::runner::{CommandRunner, CommandSpec};

/// Where gems are installed, relative to the working directory
pub const BUNDLE_PATH: &str = "vendor/bundle";

/// `<prefix>/bin/<tool>`
pub fn runtime_tool(prefix: &Path, tool: &str) -> String {
    prefix.join("bin").join(tool).to_string_lossy().into_owned()
}

/// `gem install bundler -v <constraint>`, or nothing when no install is
/// needed
pub fn bundler_install_command(overlay: &EnvOverlay, gem: &str, decision: &BundlerDecision) -> Option<CommandSpec> {
    match decision {
        BundlerDecision::Install { constraint, .. } => Some(
            overlay
                .command(gem)
                .args(["install", "bundler", "-v", constraint.as_str()]),
        ),
        BundlerDecision::Skip | BundlerDecision::FromRubygems | BundlerDecision::Shipped { .. } => {
            None
        }
    }
}

/// Bundler 1 has no `config set`
pub fn bundler_config_args(bundler_version: &str, key: &str, value: &str) -> Vec<String> {
    let args: &[&str] = if bundler_version.starts_with('1') {
        &["config", "--local", key, value]
    } else {
        &["config", "set", "--local", key, value]
    };
    args.iter().map(|a| a.to_string()).collect()
}

/// Runs `bundle` commands for one project
pub struct Bundle<'a> {
    runner: &'a dyn CommandRunner,
    overlay: EnvOverlay,
    working_directory: PathBuf,
    jobs: usize,
}

impl<'a> Bundle<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        overlay: EnvOverlay,
        working_directory: impl Into<PathBuf>,
        jobs: usize,
    ) -> Self {
        Self {
            runner,
            overlay,
            working_directory: working_directory.into(),
            jobs,
        }
    }

    fn bundle(&self) -> CommandSpec {
        self.overlay
            .command("bundle")
            .cwd(&self.working_directory)
    }

    /// Absolute install path, so it does not depend on the Gemfile's
    /// directory
    pub fn install_path(&self) -> PathBuf {
        self.working_directory.join(BUNDLE_PATH)
    }

    /// Points Bundler at [`BUNDLE_PATH`] and makes sure a lockfile exists.
    ///
    /// `bundler_version` is the resolved Bundler version; numeric versions
    /// are pinned through `$BUNDLER_VERSION` for these commands, since no
    /// lockfile may exist yet to select it.
    pub fn configure(&self, gemfiles: &Gemfiles, bundler_version: &str, grouped: bool) -> Result<()> {
        let mut bundle = self.bundle();
        if bundler_version.starts_with(|c: char| c.is_ascii_digit()) {
            tracing::info!(
                "Setting BUNDLER_VERSION={} for \"bundle config|lock\" commands below to ensure Bundler {} is used",
                bundler_version,
                bundler_version
            );
            bundle = bundle.env("BUNDLER_VERSION", bundler_version);
        }

        let path = self.install_path().to_string_lossy().into_owned();
        self.runner
            .run_checked(&bundle.clone().args(bundler_config_args(bundler_version, "path", &path)))?;

        let lockfile = self.working_directory.join(&gemfiles.lockfile);
        if lockfile.is_file() {
            self.runner.run_checked(
                &bundle
                    .clone()
                    .args(bundler_config_args(bundler_version, "deployment", "true")),
            )?;
        } else {
            // Generated here so the cache key can be computed from it
            self.runner.run_checked(&bundle.arg("lock"))?;
        }

        measure("Print lockfile", grouped, || -> Result<()> {
            let contents = std::fs::read_to_string(&lockfile)?;
            tracing::info!("{}\n{}", lockfile.display(), contents);
            Ok(())
        })
    }
}

impl DependencyInstaller for Bundle<'_> {
    fn install(&self) -> Result<()> {
        self.runner.run_checked(
            &self
                .bundle()
                .args(["install", "--jobs", &self.jobs.to_string()]),
        )?;
        Ok(())
    }

    fn check(&self) -> Result<bool> {
        Ok(self.runner.run(&self.bundle().arg("check"))?.success())
    }

    fn clean(&self) -> Result<()> {
        self.runner.run_checked(&self.bundle().arg("clean"))?;
        Ok(())
    }
}
