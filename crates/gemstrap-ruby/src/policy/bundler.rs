//! Which Bundler version a runtime gets
//!
//! The chain, in order:
//!
//! 1. A RubyGems update brings its own Bundler for `default`/`Gemfile.lock`.
//! 2. `Gemfile.lock` becomes the `BUNDLED WITH` version, else `default`.
//! 3. `default` keeps a recent shipped Bundler, otherwise becomes `latest`.
//! 4. `latest` becomes a major version based on the target Ruby.
//! 5. Known-broken combinations are downgraded ([`OVERRIDES`],
//!    [`BUNDLER_1_FALLBACKS`], [`MINOR_PINS`]).
//!
//! Most thresholds compare `major.minor` floats. The CRuby 2.3.0/2.3.1 and
//! JRuby 9.1 rows match string prefixes because they need patch precision
//! or have no usable float distinction.

use std::sync::LazyLock;

use gemstrap_core::config::BundlerRequest;
use gemstrap_core::lockfile::is_valid_bundler_version;
use gemstrap_core::{Platform, Result, SetupError};
use regex::Regex;

use super::{Rule, apply};
use crate::version::{self, Engine};

/// Facts about the resolved runtime the policy keys off
#[derive(Debug, Clone)]
pub struct RuntimeFacts {
    pub engine: Engine,
    pub version: String,
    pub float: f64,
    pub target: f64,
    pub is_head: bool,
    pub is_stable: bool,
    pub windows: bool,
    pub has_default_bundler: bool,
    pub ships_bundler_2_2: bool,
    pub ships_bundler_4: bool,
}

impl RuntimeFacts {
    pub fn new(engine: Engine, version: &str, platform: &Platform) -> Result<Self> {
        Ok(Self {
            engine,
            version: version.to_string(),
            float: version::float_version(version)?,
            target: version::target_ruby_version(engine, version)?,
            is_head: version::is_head_version(version),
            is_stable: version::is_stable_version(engine, version),
            windows: platform.is_windows(),
            has_default_bundler: version::has_bundler_default_gem(engine, version)?,
            ships_bundler_2_2: version::is_bundler2dot2_plus_default(engine, version)?,
            ships_bundler_4: version::is_bundler4_plus_default(engine, version)?,
        })
    }
}

/// Outcome of the Bundler policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundlerDecision {
    /// `none` was requested
    Skip,
    /// Whatever Bundler the RubyGems update installed
    FromRubygems,
    /// The runtime's default gem is used as-is
    Shipped { major: &'static str },
    /// `gem install bundler -v <constraint>`
    Install { version: String, constraint: String },
}

impl BundlerDecision {
    /// Version label used for `BUNDLER_VERSION` and `bundle config` syntax
    pub fn version(&self) -> Option<&str> {
        match self {
            BundlerDecision::Skip => None,
            BundlerDecision::FromRubygems => Some("unknown"),
            BundlerDecision::Shipped { major } => Some(major),
            BundlerDecision::Install { version, .. } => Some(version),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefaultChoice {
    Latest,
    Shipped,
}

static DEFAULT_RULES: &[Rule<RuntimeFacts, DefaultChoice>] = &[
    Rule {
        reason: "Installing latest Bundler on Windows because bin/bundle does not work in bash otherwise",
        when: |f| {
            f.ships_bundler_2_2
                && f.windows
                && f.engine == Engine::Ruby
                && (f.is_stable || f.version == "head")
        },
        then: DefaultChoice::Latest,
    },
    Rule {
        reason: "Using Bundler shipped with the runtime",
        when: |f| f.ships_bundler_2_2,
        then: DefaultChoice::Shipped,
    },
    Rule {
        reason: "Using latest Bundler because the default Bundler gem is too old for that Ruby version",
        when: |f| f.has_default_bundler,
        then: DefaultChoice::Latest,
    },
    Rule {
        reason: "No default Bundler gem, using latest Bundler",
        when: |_| true,
        then: DefaultChoice::Latest,
    },
];

/// A Bundler version under consideration
pub struct Candidate {
    pub runtime: RuntimeFacts,
    pub bundler: String,
    pub bundler_float: f64,
}

/// Bundler 4 needs Ruby 3.2+
pub static OVERRIDES: &[Rule<Candidate, &str>] = &[Rule {
    reason: "Bundler 4 requires Ruby 3.2+, using Bundler 2 instead on Ruby < 3.2",
    when: |c| c.bundler_float >= 4.0 && c.runtime.target < 3.2,
    then: "2",
}];

/// Runtimes where Bundler 2+ is known not to work
pub static BUNDLER_1_FALLBACKS: &[Rule<Candidate, &str>] = &[
    Rule {
        reason: "Bundler 2+ requires Ruby 2.3+, using Bundler 1 on Ruby <= 2.2",
        when: |c| {
            c.bundler_float >= 2.0 && c.runtime.engine == Engine::Ruby && c.runtime.target <= 2.2
        },
        then: "1",
    },
    Rule {
        reason: "Ruby 2.3.0 and 2.3.1 have shipped with an old rubygems that only works with Bundler 1",
        when: |c| {
            c.bundler_float >= 2.0
                && c.runtime.engine == Engine::Ruby
                && (c.runtime.version.starts_with("2.3.0") || c.runtime.version.starts_with("2.3.1"))
        },
        then: "1",
    },
    Rule {
        reason: "JRuby 9.1 has a bug with Bundler 2+, using Bundler 1 instead on JRuby 9.1",
        when: |c| {
            c.bundler_float >= 2.0
                && c.runtime.engine == Engine::JRuby
                && c.runtime.version.starts_with("9.1")
        },
        then: "1",
    },
];

/// Bundler 2 minor lines for older Rubies
pub static MINOR_PINS: &[Rule<Candidate, &str>] = &[
    Rule {
        reason: "Ruby 2.3.2 - 2.5 only works with Bundler 2.3",
        when: |c| c.bundler == "2" && c.runtime.target <= 2.5,
        then: "2.3",
    },
    Rule {
        reason: "Ruby 2.6-2.7 only works with Bundler 2.4",
        when: |c| c.bundler == "2" && c.runtime.target <= 2.7,
        then: "2.4",
    },
];

/// Runs the Bundler chain.
///
/// `pinned` is the lockfile's `BUNDLED WITH` version, read by the caller.
pub fn resolve_bundler(
    request: &BundlerRequest,
    rubygems_updated: bool,
    pinned: Option<&str>,
    facts: &RuntimeFacts,
) -> Result<BundlerDecision> {
    if rubygems_updated && request.defers_to_rubygems() {
        tracing::info!("Using the Bundler installed by updating RubyGems");
        return Ok(BundlerDecision::FromRubygems);
    }

    let mut request = request.clone();
    if request == BundlerRequest::Lockfile {
        request = match pinned {
            Some(version) if is_valid_bundler_version(version) => {
                BundlerRequest::Version(version.to_string())
            }
            _ => BundlerRequest::Default,
        };
    }

    if request == BundlerRequest::Default {
        tracing::debug!("Resolving default Bundler for {}-{}", facts.engine, facts.version);
        match apply(DEFAULT_RULES, facts) {
            Some(DefaultChoice::Shipped) => {
                let major = if facts.ships_bundler_4 { "4" } else { "2" };
                return Ok(BundlerDecision::Shipped { major });
            }
            _ => request = BundlerRequest::Latest,
        }
    }

    let mut bundler = match request {
        BundlerRequest::None => return Ok(BundlerDecision::Skip),
        BundlerRequest::Version(version) => version,
        // only `latest` is left at this point
        _ if facts.target < 3.2 => "2".to_string(),
        _ => "4".to_string(),
    };

    let malformed = |input: &str| SetupError::MalformedAuxVersionInput {
        tool: "bundler".to_string(),
        input: input.to_string(),
    };
    if !is_valid_bundler_version(&bundler) {
        return Err(malformed(&bundler));
    }

    for table in [OVERRIDES, BUNDLER_1_FALLBACKS, MINOR_PINS] {
        let candidate = Candidate {
            runtime: facts.clone(),
            bundler_float: version::float_version(&bundler).map_err(|_| malformed(&bundler))?,
            bundler: bundler.clone(),
        };
        if let Some(then) = apply(table, &candidate) {
            bundler = then.to_string();
        }
    }

    let constraint = install_constraint(&bundler);
    Ok(BundlerDecision::Install {
        version: bundler,
        constraint,
    })
}

static NUMERIC_COMPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("valid component pattern"));

/// Exact for 3+ numeric components, pessimistic otherwise
pub fn install_constraint(version: &str) -> String {
    if NUMERIC_COMPONENT.find_iter(version).count() >= 3 {
        version.to_string()
    } else {
        format!("~> {}.0", version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemstrap_core::{Arch, OsFamily};

    fn linux() -> Platform {
        Platform::new(OsFamily::Ubuntu, "24.04", Arch::X64)
    }

    fn windows() -> Platform {
        Platform::new(OsFamily::Windows, "2022", Arch::X64)
    }

    fn facts(engine: Engine, version: &str) -> RuntimeFacts {
        RuntimeFacts::new(engine, version, &linux()).unwrap()
    }

    fn installed(decision: BundlerDecision) -> (String, String) {
        match decision {
            BundlerDecision::Install {
                version,
                constraint,
            } => (version, constraint),
            other => panic!("expected an install, got {:?}", other),
        }
    }

    #[test]
    fn test_old_ruby_forces_bundler_1() {
        let decision =
            resolve_bundler(&BundlerRequest::Latest, false, None, &facts(Engine::Ruby, "2.2.5"))
                .unwrap();
        assert_eq!(installed(decision), ("1".to_string(), "~> 1.0".to_string()));
    }

    #[test]
    fn test_ruby_2_3_0_and_2_3_1_use_bundler_1() {
        for version in ["2.3.0", "2.3.1"] {
            let decision =
                resolve_bundler(&BundlerRequest::Latest, false, None, &facts(Engine::Ruby, version))
                    .unwrap();
            assert_eq!(installed(decision).0, "1");
        }
        let decision =
            resolve_bundler(&BundlerRequest::Latest, false, None, &facts(Engine::Ruby, "2.3.8"))
                .unwrap();
        assert_eq!(installed(decision).0, "2.3");
    }

    #[test]
    fn test_jruby_9_1_uses_bundler_1() {
        let decision = resolve_bundler(
            &BundlerRequest::Version("2.4.22".to_string()),
            false,
            None,
            &facts(Engine::JRuby, "9.1.17.0"),
        )
        .unwrap();
        assert_eq!(installed(decision).0, "1");
    }

    #[test]
    fn test_latest_picks_major_by_target_ruby() {
        let decision =
            resolve_bundler(&BundlerRequest::Latest, false, None, &facts(Engine::Ruby, "3.3.6"))
                .unwrap();
        assert_eq!(installed(decision), ("4".to_string(), "~> 4.0".to_string()));

        let decision =
            resolve_bundler(&BundlerRequest::Latest, false, None, &facts(Engine::Ruby, "3.1.6"))
                .unwrap();
        assert_eq!(installed(decision).0, "2");

        let decision =
            resolve_bundler(&BundlerRequest::Latest, false, None, &facts(Engine::Ruby, "2.6.10"))
                .unwrap();
        assert_eq!(installed(decision).0, "2.4");
    }

    #[test]
    fn test_bundler_4_downgraded_on_old_ruby() {
        let decision = resolve_bundler(
            &BundlerRequest::Version("4".to_string()),
            false,
            None,
            &facts(Engine::Ruby, "3.0.7"),
        )
        .unwrap();
        assert_eq!(installed(decision).0, "2");
    }

    #[test]
    fn test_default_uses_shipped_bundler() {
        let decision =
            resolve_bundler(&BundlerRequest::Default, false, None, &facts(Engine::Ruby, "3.3.6"))
                .unwrap();
        assert_eq!(decision, BundlerDecision::Shipped { major: "2" });

        let decision =
            resolve_bundler(&BundlerRequest::Default, false, None, &facts(Engine::Ruby, "head"))
                .unwrap();
        assert_eq!(decision, BundlerDecision::Shipped { major: "4" });
    }

    #[test]
    fn test_default_on_windows_installs_latest() {
        let facts = RuntimeFacts::new(Engine::Ruby, "3.3.6", &windows()).unwrap();
        let decision = resolve_bundler(&BundlerRequest::Default, false, None, &facts).unwrap();
        assert_eq!(installed(decision).0, "4");

        let ucrt = RuntimeFacts::new(Engine::Ruby, "ucrt", &windows()).unwrap();
        let decision = resolve_bundler(&BundlerRequest::Default, false, None, &ucrt).unwrap();
        assert_eq!(decision, BundlerDecision::Shipped { major: "4" });
    }

    #[test]
    fn test_default_with_old_default_gem_installs_latest() {
        let decision =
            resolve_bundler(&BundlerRequest::Default, false, None, &facts(Engine::Ruby, "2.7.8"))
                .unwrap();
        assert_eq!(installed(decision).0, "2.4");
    }

    #[test]
    fn test_lockfile_pinned_version_is_exact() {
        let decision = resolve_bundler(
            &BundlerRequest::Lockfile,
            false,
            Some("2.5.22"),
            &facts(Engine::Ruby, "3.3.6"),
        )
        .unwrap();
        assert_eq!(installed(decision), ("2.5.22".to_string(), "2.5.22".to_string()));
    }

    #[test]
    fn test_lockfile_without_pin_falls_back_to_default() {
        let decision =
            resolve_bundler(&BundlerRequest::Lockfile, false, None, &facts(Engine::Ruby, "3.3.6"))
                .unwrap();
        assert_eq!(decision, BundlerDecision::Shipped { major: "2" });
    }

    #[test]
    fn test_rubygems_update_supplies_bundler() {
        let decision =
            resolve_bundler(&BundlerRequest::Lockfile, true, Some("2.5.22"), &facts(Engine::Ruby, "3.3.6"))
                .unwrap();
        assert_eq!(decision, BundlerDecision::FromRubygems);
        assert_eq!(decision.version(), Some("unknown"));

        let decision =
            resolve_bundler(&BundlerRequest::Latest, true, None, &facts(Engine::Ruby, "3.3.6"))
                .unwrap();
        assert_eq!(installed(decision).0, "4");
    }

    #[test]
    fn test_none_skips() {
        let decision =
            resolve_bundler(&BundlerRequest::None, false, None, &facts(Engine::Ruby, "3.3.6"))
                .unwrap();
        assert_eq!(decision, BundlerDecision::Skip);
        assert_eq!(decision.version(), None);
    }

    #[test]
    fn test_truffleruby_default() {
        let decision = resolve_bundler(
            &BundlerRequest::Default,
            false,
            None,
            &facts(Engine::TruffleRuby, "20.3.0"),
        )
        .unwrap();
        assert_eq!(installed(decision).0, "2.4");
    }

    #[test]
    fn test_unparseable_bundler_is_malformed_input() {
        let request = BundlerRequest::parse("2.x").unwrap();
        let err = resolve_bundler(&request, false, None, &facts(Engine::Ruby, "3.3.6")).unwrap_err();
        assert!(matches!(
            err,
            SetupError::MalformedAuxVersionInput { ref tool, ref input } if tool == "bundler" && input == "2.x"
        ));

        let err = resolve_bundler(
            &BundlerRequest::Lockfile,
            false,
            Some("2.x"),
            &facts(Engine::Ruby, "3.3.6"),
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("MALFORMED_AUX_VERSION"));
    }

    #[test]
    fn test_install_constraint() {
        assert_eq!(install_constraint("2"), "~> 2.0");
        assert_eq!(install_constraint("2.4"), "~> 2.4.0");
        assert_eq!(install_constraint("2.5.22"), "2.5.22");
    }
}
