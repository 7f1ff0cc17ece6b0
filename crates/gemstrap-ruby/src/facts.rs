//! Facts about the machine and process the run happens in

use std::path::{Path, PathBuf};

use gemstrap_core::platform::detect_platform;
use gemstrap_core::{Platform, Result};

use crate::cache::ScopingFacts;

pub trait EnvironmentFacts {
    fn platform(&self) -> Result<Platform>;

    /// A non-empty environment variable
    fn var(&self, name: &str) -> Option<String>;

    fn cpus(&self) -> usize;

    fn home_dir(&self) -> Option<PathBuf>;
}

/// Reads the real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemFacts;

impl EnvironmentFacts for SystemFacts {
    fn platform(&self) -> Result<Platform> {
        detect_platform(self.var("ImageOS").as_deref())
    }

    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|value| !value.is_empty())
    }

    fn cpus(&self) -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }
}

pub fn in_github_actions(facts: &dyn EnvironmentFacts) -> bool {
    facts.var("GITHUB_ACTIONS").as_deref() == Some("true")
}

/// Why the runner counts as self-hosted, or `None` for hosted runners.
///
/// `configured` comes from configuration and wins over detection.
pub fn self_hosted_reason(
    facts: &dyn EnvironmentFacts,
    configured: Option<bool>,
) -> Option<String> {
    match configured {
        Some(true) => return Some("the self_hosted setting is true".to_string()),
        Some(false) => return None,
        None => {}
    }

    if facts.var("RUNNER_ENVIRONMENT").as_deref() == Some("self-hosted") {
        Some("$RUNNER_ENVIRONMENT is self-hosted".to_string())
    } else if facts.var("AGENT_TOOLSDIRECTORY").is_some() {
        Some("$AGENT_TOOLSDIRECTORY is set".to_string())
    } else if facts.var("ImageOS").is_none() {
        Some("$ImageOS is not set".to_string())
    } else {
        None
    }
}

/// Bundler settings and location that change the installed gem set
pub fn scoping_facts(facts: &dyn EnvironmentFacts, working_directory: &Path) -> ScopingFacts {
    let var = |name: &str| facts.var(name).unwrap_or_default();
    ScopingFacts {
        working_directory: working_directory.to_string_lossy().into_owned(),
        bundle_with: var("BUNDLE_WITH"),
        bundle_without: var("BUNDLE_WITHOUT"),
        bundle_only: var("BUNDLE_ONLY"),
    }
}

/// Parallel `bundle install` jobs: one per CPU, at most 8
pub fn bundle_jobs(facts: &dyn EnvironmentFacts) -> usize {
    facts.cpus().clamp(1, 8)
}
