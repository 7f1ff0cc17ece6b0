//! The whole setup run, from version request to installed gems
//!
//! ```text
//! read version request ─→ resolve ─→ install runtime ─→ PATH / env / JAVA_HOME
//!     ─→ RubyGems update ─→ Bundler install ─→ bundle install (cached)
//! ```
//!
//! Every stage either succeeds or aborts the run with a single
//! [`SetupError`]. Collaborators come in through [`Services`] so the
//! sequence can run against fakes.

use std::path::{Path, PathBuf};

use gemstrap_core::config::{BundlerRequest, Config, RubygemsRequest, VersionRequest};
use gemstrap_core::digest::sha256_file;
use gemstrap_core::lockfile::{Gemfiles, detect_gemfiles, read_pinned_bundler};
use gemstrap_core::project::read_version_request;
use gemstrap_core::{Platform, Result, SetupError};
use serde::Serialize;

use crate::bundle::{BUNDLE_PATH, Bundle, bundler_install_command, runtime_tool};
use crate::cache::{
    CacheBackend, CacheCoordinator, CacheKeyFacts, CacheKeys, InstallOutcome, build_base_key,
    build_full_key, key::needs_abi, restore_prefix,
};
use crate::catalog::VersionCatalog;
use crate::env::{EnvExporter, EnvOverlay, SessionEnv, windows_variables};
use crate::facts::{
    EnvironmentFacts, bundle_jobs, in_github_actions, scoping_facts, self_hosted_reason,
};
use crate::install::java::ensure_java_home;
use crate::install::{InstallRequest, RuntimeInstaller, ToolCache, should_use_tool_cache};
use crate::measure::measure;
use crate::policy::{
    BundlerDecision, RubygemsPlan, RuntimeFacts, coerce_version, plan_rubygems, resolve_bundler,
};
use crate::resolve::{ResolvedVersion, resolve};
use crate::runner::{CommandRunner, CommandSpec};
use crate::version::Engine;

/// Decoded inputs of one run
#[derive(Debug, Clone)]
pub struct SetupOptions {
    pub version: VersionRequest,
    pub bundler: BundlerRequest,
    pub rubygems: RubygemsRequest,
    pub bundler_cache: bool,
    pub cache_version: String,
    pub no_save_events: Vec<String>,
    /// Absolute; project files are looked up here
    pub working_directory: PathBuf,
    pub self_hosted: Option<bool>,
    pub tool_cache: Option<PathBuf>,
}

impl SetupOptions {
    /// Decodes sentinel strings; relative paths are resolved against
    /// `base_dir`.
    pub fn from_config(config: &Config, base_dir: &Path) -> Result<Self> {
        let bundler = BundlerRequest::parse(&config.bundler.version)?;
        if config.bundler.cache && bundler == BundlerRequest::None {
            return Err(SetupError::ConfigInvalidValue {
                field: "bundler.version".to_string(),
                reason: "cannot be none when bundler.cache is enabled".to_string(),
            });
        }

        let working_directory = match &config.runner.working_directory {
            Some(dir) => base_dir.join(dir),
            None => base_dir.to_path_buf(),
        };

        Ok(Self {
            version: VersionRequest::parse(&config.ruby.version),
            bundler,
            rubygems: RubygemsRequest::parse(&config.rubygems.version)?,
            bundler_cache: config.bundler.cache,
            cache_version: config.cache.version.clone(),
            no_save_events: config.cache.no_save_events.clone(),
            working_directory,
            self_hosted: config.runner.self_hosted,
            tool_cache: config
                .runner
                .tool_cache
                .as_ref()
                .map(|dir| base_dir.join(dir)),
        })
    }
}

/// Collaborators of a run
pub struct Services<'a> {
    pub facts: &'a dyn EnvironmentFacts,
    pub catalog: &'a VersionCatalog,
    pub runner: &'a dyn CommandRunner,
    pub installer: &'a dyn RuntimeInstaller,
    pub cache: &'a dyn CacheBackend,
}

/// What a run produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupReport {
    pub prefix: PathBuf,
    pub engine: String,
    pub version: String,
    /// `None` when Bundler was not set up
    pub bundler: Option<String>,
    pub rubygems_updated: bool,
    pub cache: Option<InstallOutcome>,
}

/// Values fixed at the start of a run
struct RunContext {
    platform: Platform,
    grouped: bool,
    working_directory: PathBuf,
}

/// Runs the full setup sequence.
pub fn install_runtime(
    options: &SetupOptions,
    services: &Services<'_>,
    exporter: &mut dyn EnvExporter,
) -> Result<SetupReport> {
    let facts = services.facts;
    let ctx = RunContext {
        platform: facts.platform()?,
        grouped: in_github_actions(facts),
        working_directory: options.working_directory.clone(),
    };
    tracing::debug!("Platform: {}", ctx.platform.id());

    let spec = read_version_request(&options.version, &ctx.working_directory)?;
    let resolved = resolve(&spec, &ctx.platform, services.catalog)?;
    tracing::info!("Resolved {} to {}", spec, resolved);

    let request = install_request(options, facts, &ctx, resolved.clone())?;
    let installed = services.installer.install(&request)?;

    let path = facts.var("PATH").unwrap_or_default();
    let mut session = SessionEnv::new(EnvOverlay::new(&path, ctx.platform.is_windows()), exporter);
    session.setup_path(&installed.bin_dirs)?;
    if ctx.platform.is_windows() {
        for (name, value) in windows_variables(|name| facts.var(name), &installed.prefix) {
            session.export_variable(&name, &value)?;
        }
    }

    if resolved.engine == Engine::JRuby {
        ensure_java_home(services.runner, &mut session, facts, &ctx.platform, ctx.grouped)?;
    }

    let runtime = RuntimeFacts::new(resolved.engine, &resolved.version, &ctx.platform)?;
    let gem = runtime_tool(&installed.prefix, "gem");

    let rubygems_updated = if options.rubygems.is_set() {
        update_rubygems(options, services.runner, &session, &runtime, &gem, &ctx)?
    } else {
        false
    };

    let gemfiles = if options.bundler != BundlerRequest::None || options.bundler_cache {
        detect_gemfiles(
            &ctx.working_directory,
            facts.var("BUNDLE_GEMFILE").as_deref(),
        )?
    } else {
        None
    };

    let mut bundler = None;
    if options.bundler != BundlerRequest::None {
        let decision = install_bundler(
            options,
            services.runner,
            &session,
            &runtime,
            &gem,
            gemfiles.as_ref(),
            rubygems_updated,
            &ctx,
        )?;
        bundler = decision.version().map(str::to_string);
    }

    let mut cache = None;
    if options.bundler_cache {
        match &gemfiles {
            Some(gemfiles) => {
                let bundler_version = bundler.as_deref().unwrap_or("unknown");
                cache = Some(bundle_install(
                    options,
                    services,
                    &session,
                    gemfiles,
                    &resolved,
                    bundler_version,
                    &ctx,
                )?);
            }
            None => tracing::info!(
                "No Gemfile or gems.rb in {}, skipping bundle install",
                ctx.working_directory.display()
            ),
        }
    }

    session.set_output("ruby-prefix", &installed.prefix.to_string_lossy())?;

    Ok(SetupReport {
        prefix: installed.prefix,
        engine: resolved.engine.to_string(),
        version: resolved.version,
        bundler,
        rubygems_updated,
        cache,
    })
}

fn install_request(
    options: &SetupOptions,
    facts: &dyn EnvironmentFacts,
    ctx: &RunContext,
    resolved: ResolvedVersion,
) -> Result<InstallRequest> {
    let self_hosted = self_hosted_reason(facts, options.self_hosted);
    let tool_cache = if should_use_tool_cache(&resolved, self_hosted.is_some()) {
        Some(ToolCache::locate(
            options.tool_cache.as_deref(),
            facts.var("RUNNER_TOOL_CACHE").as_deref(),
            &ctx.platform,
            self_hosted.is_some(),
        )?)
    } else {
        None
    };

    let home_dir = facts
        .home_dir()
        .ok_or_else(|| SetupError::Generic("Could not determine the home directory".to_string()))?;
    let temp_dir = facts
        .var("RUNNER_TEMP")
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("gemstrap"));

    Ok(InstallRequest {
        resolved,
        platform: ctx.platform.clone(),
        tool_cache,
        self_hosted,
        home_dir,
        temp_dir,
        grouped: ctx.grouped,
    })
}

fn argv_command(session: &SessionEnv<'_>, argv: &[String]) -> Option<CommandSpec> {
    let (program, args) = argv.split_first()?;
    Some(session.command(program.as_str()).args(args))
}

fn update_rubygems(
    options: &SetupOptions,
    runner: &dyn CommandRunner,
    session: &SessionEnv<'_>,
    runtime: &RuntimeFacts,
    gem: &str,
    ctx: &RunContext,
) -> Result<bool> {
    let current = match &options.rubygems {
        RubygemsRequest::Version(_) => {
            let output = runner.run_checked(&session.command(gem).arg("--version").capture())?;
            coerce_version(&output.stdout)
        }
        RubygemsRequest::Default | RubygemsRequest::Latest => None,
    };

    let plan = plan_rubygems(&options.rubygems, runtime, current.as_ref());
    if plan == RubygemsPlan::Unsupported {
        tracing::info!(
            "Cannot update RubyGems for {}-{}",
            runtime.engine,
            runtime.version
        );
    }

    measure("Updating RubyGems", ctx.grouped, || -> Result<()> {
        for argv in plan.commands(gem) {
            if let Some(command) = argv_command(session, &argv) {
                runner.run_checked(&command)?;
            }
        }
        Ok(())
    })?;

    Ok(plan.updates_rubygems())
}

#[allow(clippy::too_many_arguments)]
fn install_bundler(
    options: &SetupOptions,
    runner: &dyn CommandRunner,
    session: &SessionEnv<'_>,
    runtime: &RuntimeFacts,
    gem: &str,
    gemfiles: Option<&Gemfiles>,
    rubygems_updated: bool,
    ctx: &RunContext,
) -> Result<BundlerDecision> {
    let pinned = match gemfiles {
        Some(gemfiles) if options.bundler == BundlerRequest::Lockfile => {
            read_pinned_bundler(&ctx.working_directory.join(&gemfiles.lockfile))?
        }
        _ => None,
    };

    let decision = resolve_bundler(&options.bundler, rubygems_updated, pinned.as_deref(), runtime)?;
    if let Some(command) = bundler_install_command(session.overlay(), gem, &decision) {
        measure("Installing Bundler", ctx.grouped, || runner.run_checked(&command))?;
    }
    Ok(decision)
}

fn bundle_install(
    options: &SetupOptions,
    services: &Services<'_>,
    session: &SessionEnv<'_>,
    gemfiles: &Gemfiles,
    resolved: &ResolvedVersion,
    bundler_version: &str,
    ctx: &RunContext,
) -> Result<InstallOutcome> {
    let bundle = Bundle::new(
        services.runner,
        session.overlay().clone(),
        &ctx.working_directory,
        bundle_jobs(services.facts),
    );
    bundle.configure(gemfiles, bundler_version, ctx.grouped)?;

    let abi = if needs_abi(resolved.engine, &resolved.version) {
        Some(query_abi(services.runner, session.overlay())?)
    } else {
        None
    };
    let key_facts = cache_key_facts(
        services.facts,
        &ctx.platform,
        resolved,
        &options.cache_version,
        &ctx.working_directory,
        gemfiles,
        abi,
    );
    let keys = cache_keys(&key_facts, &ctx.working_directory.join(&gemfiles.lockfile))?;

    let save_allowed = match services.facts.var("GITHUB_EVENT_NAME") {
        Some(event) => !options.no_save_events.contains(&event),
        None => true,
    };

    measure("bundle install", ctx.grouped, || {
        CacheCoordinator::new(services.cache, vec![PathBuf::from(BUNDLE_PATH)])
            .save_allowed(save_allowed)
            .install(keys.as_ref(), &bundle)
    })
}

/// `RbConfig::CONFIG['ruby_version']` of the runtime first on PATH
pub fn query_abi(runner: &dyn CommandRunner, overlay: &EnvOverlay) -> Result<String> {
    let output = runner.run_checked(
        &overlay
            .command("ruby")
            .args(["-e", "print RbConfig::CONFIG['ruby_version']"])
            .capture(),
    )?;
    Ok(output.stdout.trim().to_string())
}

pub fn cache_key_facts(
    facts: &dyn EnvironmentFacts,
    platform: &Platform,
    resolved: &ResolvedVersion,
    cache_version: &str,
    working_directory: &Path,
    gemfiles: &Gemfiles,
    abi: Option<String>,
) -> CacheKeyFacts {
    CacheKeyFacts {
        platform_id: platform.id(),
        engine: resolved.engine,
        version: resolved.version.clone(),
        scoping: scoping_facts(facts, working_directory),
        cache_version: cache_version.to_string(),
        abi,
        lockfile: gemfiles.lockfile_name(),
    }
}

/// Full and restore keys, or `None` when there is no lockfile to digest
pub fn cache_keys(facts: &CacheKeyFacts, lockfile: &Path) -> Result<Option<CacheKeys>> {
    if !lockfile.is_file() {
        return Ok(None);
    }
    let base = build_base_key(facts);
    let digest = sha256_file(lockfile)?;
    Ok(Some(CacheKeys {
        full: build_full_key(&base, &digest),
        restore_prefix: restore_prefix(&base),
    }))
}
