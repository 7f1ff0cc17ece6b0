//! Setup command - install Ruby, Bundler and cached gems

use std::io;

use anyhow::Result;
use colored::Colorize;
use gemstrap_ruby::cache::LocalCacheBackend;
use gemstrap_ruby::env::{GithubExporter, ShellExporter};
use gemstrap_ruby::facts::{EnvironmentFacts, SystemFacts};
use gemstrap_ruby::install::{BuilderInstaller, PlatformInstaller, WindowsInstaller};
use gemstrap_ruby::runner::ProcessRunner;
use gemstrap_ruby::{Services, SetupReport, VersionCatalog, install_runtime};

use crate::cli::SetupArgs;
use crate::context::Context;

/// Execute `gemstrap setup`
///
/// Inside GitHub Actions the environment is exported through the workflow
/// files; elsewhere `export` lines are printed for `eval`.
pub fn run(args: &SetupArgs) -> Result<()> {
    let ctx = Context::for_setup(args)?;
    let options = ctx.options()?;

    let facts = SystemFacts;
    let catalog = VersionCatalog::embedded()?;
    let runner = ProcessRunner;
    let installer = PlatformInstaller::new(
        BuilderInstaller::new(),
        WindowsInstaller::new(&catalog, &runner),
    );
    let cache = LocalCacheBackend::new(ctx.cache_dir(), options.working_directory.clone());
    tracing::debug!("Local cache at {}", cache.root().display());

    let services = Services {
        facts: &facts,
        catalog: &catalog,
        runner: &runner,
        installer: &installer,
        cache: &cache,
    };

    let report = match GithubExporter::from_vars(|name| facts.var(name)) {
        Some(mut exporter) => install_runtime(&options, &services, &mut exporter)?,
        None => {
            let mut exporter = ShellExporter::new(io::stdout());
            install_runtime(&options, &services, &mut exporter)?
        }
    };

    print_summary(&report);
    Ok(())
}

/// Summary goes to stderr; stdout may be consumed by `eval`
fn print_summary(report: &SetupReport) {
    eprintln!(
        "{} {}-{} at {}",
        "✓".green().bold(),
        report.engine,
        report.version,
        report.prefix.display()
    );
    if report.rubygems_updated {
        eprintln!("{} RubyGems updated", "✓".green().bold());
    }
    if let Some(bundler) = &report.bundler {
        eprintln!("{} Bundler {}", "✓".green().bold(), bundler);
    }
    if let Some(outcome) = &report.cache {
        let status = if outcome.exact_hit {
            "exact hit".green()
        } else if outcome.from_cache {
            "partial hit".yellow()
        } else {
            "miss".yellow()
        };
        let saved = if outcome.saved { ", saved" } else { "" };
        eprintln!("{} Gems installed (cache {}{})", "✓".green().bold(), status, saved);
    }
}
