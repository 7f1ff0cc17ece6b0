//! RubyGems update policy
//!
//! Older RubyGems releases ignore `required_ruby_version` when running
//! `gem update --system`, so `latest` is capped per CRuby series.

use gemstrap_core::config::RubygemsRequest;

use super::bundler::RuntimeFacts;
use super::{Rule, apply};
use crate::version::Engine;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RubygemsPlan {
    /// Nothing requested
    Unchanged,
    /// Head builds ship their own RubyGems
    KeepBundled,
    /// `gem update --system [version]`
    UpdateSystem(Option<String>),
    /// `gem install rubygems-update -v <version>` then `update_rubygems`
    InstallUpdateGem(String),
    /// Requested version is not newer than the installed one
    AlreadyCurrent,
    /// Runtime too old for any supported RubyGems
    Unsupported,
}

impl RubygemsPlan {
    /// Argument vectors to run, in order; `gem` is the runtime's `gem`
    /// executable.
    pub fn commands(&self, gem: &str) -> Vec<Vec<String>> {
        let argv = |args: &[&str]| args.iter().map(|a| a.to_string()).collect::<Vec<_>>();
        match self {
            RubygemsPlan::UpdateSystem(None) => vec![argv(&[gem, "update", "--system"])],
            RubygemsPlan::UpdateSystem(Some(version)) => {
                vec![argv(&[gem, "update", "--system", version.as_str()])]
            }
            RubygemsPlan::InstallUpdateGem(version) => vec![
                argv(&[gem, "install", "rubygems-update", "-v", version.as_str(), "--no-document"]),
                argv(&["update_rubygems"]),
            ],
            RubygemsPlan::Unchanged
            | RubygemsPlan::KeepBundled
            | RubygemsPlan::AlreadyCurrent
            | RubygemsPlan::Unsupported => Vec::new(),
        }
    }

    /// Whether Bundler may have been replaced by this plan
    pub fn updates_rubygems(&self) -> bool {
        !matches!(self, RubygemsPlan::Unchanged)
    }
}

#[derive(Debug, Clone, Copy)]
enum LatestStep {
    KeepBundled,
    UpdateSystem(Option<&'static str>),
    InstallUpdateGem(&'static str),
    Unsupported,
}

static LATEST_RULES: &[Rule<RuntimeFacts, LatestStep>] = &[
    Rule {
        reason: "Updating RubyGems of a non-CRuby runtime to the latest version",
        when: |f| f.engine != Engine::Ruby,
        then: LatestStep::UpdateSystem(None),
    },
    Rule {
        reason: "Ruby master builds use included RubyGems",
        when: |f| f.is_head,
        then: LatestStep::KeepBundled,
    },
    Rule {
        reason: "Updating RubyGems to the latest version",
        when: |f| f.float >= 3.2,
        then: LatestStep::UpdateSystem(None),
    },
    Rule {
        reason: "Ruby 3.1 supports RubyGems up to 3.6.9",
        when: |f| f.float >= 3.1,
        then: LatestStep::UpdateSystem(Some("3.6.9")),
    },
    Rule {
        reason: "Ruby 3.0 supports RubyGems up to 3.5.23",
        when: |f| f.float >= 3.0,
        then: LatestStep::UpdateSystem(Some("3.5.23")),
    },
    Rule {
        reason: "Ruby 2.6-2.7 supports RubyGems up to 3.4.22",
        when: |f| f.float >= 2.6,
        then: LatestStep::UpdateSystem(Some("3.4.22")),
    },
    Rule {
        reason: "Ruby 2.3-2.5 supports RubyGems up to 3.3.27",
        when: |f| f.float >= 2.3,
        then: LatestStep::UpdateSystem(Some("3.3.27")),
    },
    Rule {
        reason: "Ruby 1.9-2.2 needs rubygems-update 2.7.11",
        when: |f| f.float >= 1.9,
        then: LatestStep::InstallUpdateGem("2.7.11"),
    },
    Rule {
        reason: "Cannot update RubyGems for this Ruby version",
        when: |_| true,
        then: LatestStep::Unsupported,
    },
];

/// Decides the RubyGems update.
///
/// `current` is the version reported by `gem --version`; it is only needed
/// for explicit versions.
pub fn plan_rubygems(
    request: &RubygemsRequest,
    facts: &RuntimeFacts,
    current: Option<&semver::Version>,
) -> RubygemsPlan {
    match request {
        RubygemsRequest::Default => RubygemsPlan::Unchanged,
        RubygemsRequest::Latest => match apply(LATEST_RULES, facts) {
            Some(LatestStep::KeepBundled) => RubygemsPlan::KeepBundled,
            Some(LatestStep::UpdateSystem(version)) => {
                RubygemsPlan::UpdateSystem(version.map(str::to_string))
            }
            Some(LatestStep::InstallUpdateGem(version)) => {
                RubygemsPlan::InstallUpdateGem(version.to_string())
            }
            Some(LatestStep::Unsupported) | None => RubygemsPlan::Unsupported,
        },
        RubygemsRequest::Version(requested) => match current {
            Some(current) if requested <= current => {
                tracing::info!(
                    "Skipping RubyGems update because the given version ({}) is not newer than the default version ({})",
                    requested,
                    current
                );
                RubygemsPlan::AlreadyCurrent
            }
            _ => {
                tracing::info!("Updating RubyGems to {}", requested);
                RubygemsPlan::UpdateSystem(Some(requested.to_string()))
            }
        },
    }
}

/// Lenient parse of `gem --version` output: the first three numeric
/// components, missing ones as zero.
pub fn coerce_version(output: &str) -> Option<semver::Version> {
    let start = output.find(|c: char| c.is_ascii_digit())?;
    let mut parts = output[start..]
        .split(|c: char| !c.is_ascii_digit() && c != '.')
        .next()?
        .split('.')
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<u64>());

    let major = parts.next()?.ok()?;
    let minor = parts.next().and_then(|p| p.ok()).unwrap_or(0);
    let patch = parts.next().and_then(|p| p.ok()).unwrap_or(0);
    Some(semver::Version::new(major, minor, patch))
}
