//! Cache-key command - the keys a setup run would restore and save under

use anyhow::{Result, anyhow};
use gemstrap_core::lockfile::detect_gemfiles;
use gemstrap_core::project::read_version_request;
use gemstrap_ruby::cache::build_base_key;
use gemstrap_ruby::cache::key::needs_abi;
use gemstrap_ruby::env::EnvOverlay;
use gemstrap_ruby::facts::{EnvironmentFacts, SystemFacts};
use gemstrap_ruby::orchestrator::{cache_key_facts, cache_keys, query_abi};
use gemstrap_ruby::runner::ProcessRunner;
use gemstrap_ruby::{VersionCatalog, resolve};
use serde::Serialize;

use crate::cli::InputArgs;
use crate::context::Context;
use crate::output::{print_json, print_text};

#[derive(Debug, Serialize)]
struct CacheKeyOutput {
    base: String,
    /// Absent until the lockfile exists
    full: Option<String>,
    restore_prefix: Option<String>,
}

/// Execute `gemstrap cache-key`
pub fn run(input: &InputArgs, cache_version: Option<String>, json: bool) -> Result<()> {
    let mut ctx = Context::new(input)?;
    if let Some(version) = cache_version {
        ctx.config.cache.version = version;
    }
    let options = ctx.options()?;
    let working_directory = &options.working_directory;

    let facts = SystemFacts;
    let platform = facts.platform()?;
    let catalog = VersionCatalog::embedded()?;
    let spec = read_version_request(&options.version, working_directory)?;
    let resolved = resolve(&spec, &platform, &catalog)?;

    let gemfiles = detect_gemfiles(working_directory, facts.var("BUNDLE_GEMFILE").as_deref())?
        .ok_or_else(|| anyhow!("no Gemfile or gems.rb in {}", working_directory.display()))?;

    // Head builds key on the ABI of the runtime already on PATH
    let abi = if needs_abi(resolved.engine, &resolved.version) {
        let overlay = EnvOverlay::new(&facts.var("PATH").unwrap_or_default(), platform.is_windows());
        Some(query_abi(&ProcessRunner, &overlay)?)
    } else {
        None
    };

    let key_facts = cache_key_facts(
        &facts,
        &platform,
        &resolved,
        &options.cache_version,
        working_directory,
        &gemfiles,
        abi,
    );
    let keys = cache_keys(&key_facts, &working_directory.join(&gemfiles.lockfile))?;
    let output = CacheKeyOutput {
        base: build_base_key(&key_facts),
        full: keys.as_ref().map(|k| k.full.clone()),
        restore_prefix: keys.map(|k| k.restore_prefix),
    };

    if json {
        print_json(&output)?;
    } else {
        print_text(&format!("base:    {}", output.base))?;
        match (&output.full, &output.restore_prefix) {
            (Some(full), Some(prefix)) => {
                print_text(&format!("full:    {}", full))?;
                print_text(&format!("restore: {}", prefix))?;
            }
            _ => print_text(&format!("no {} yet, nothing is cached", gemfiles.lockfile_name()))?,
        }
    }
    Ok(())
}
