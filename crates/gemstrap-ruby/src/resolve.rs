//! Turning a loose specifier into an exact catalog entry
//!
//! ```text
//! resolve("3.3")
//!     ↓
//! 1. Split into (engine, fragment): "3.3" → (ruby, "3.3")
//!     ↓
//! 2. Catalog lookup for (platform, engine)   → UnknownEngine
//!     ↓
//! 3. Exact match?                            → done
//!     ↓ (no)
//! 4. Newest stable entry starting with fragment
//!     ↓ (none)
//! 5. Newest non-head entry starting with fragment → UnknownVersion
//!     ↓
//! 6. Hard exclusions                         → UnsupportedCombination
//! ```

use std::fmt;

use gemstrap_core::{Arch, Platform, Result, SetupError};
use serde::Serialize;

use crate::catalog::VersionCatalog;
use crate::policy::{Rule, first_match};
use crate::version::{self, Engine};

/// A catalog entry that exists for the platform it was resolved on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedVersion {
    pub engine: Engine,
    pub version: String,
}

impl ResolvedVersion {
    pub fn new(engine: Engine, version: impl Into<String>) -> Self {
        Self {
            engine,
            version: version.into(),
        }
    }

    pub fn is_head(&self) -> bool {
        version::is_head_version(&self.version)
    }

    pub fn float(&self) -> Result<f64> {
        version::float_version(&self.version)
    }
}

impl fmt::Display for ResolvedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.engine, self.version)
    }
}

/// Splits a specifier into engine name and version fragment.
///
/// An empty fragment means "latest stable".
pub fn parse_engine_and_version(spec: &str) -> (String, String) {
    let spec = spec.trim();
    if spec.starts_with(|c: char| c.is_ascii_digit()) || version::is_head_version(spec) {
        (Engine::Ruby.as_str().to_string(), spec.to_string())
    } else {
        match spec.split_once('-') {
            Some((engine, version)) => (engine.to_string(), version.to_string()),
            None => (spec.to_string(), String::new()),
        }
    }
}

/// Resolves `spec` against the catalog for `platform`.
pub fn resolve(spec: &str, platform: &Platform, catalog: &VersionCatalog) -> Result<ResolvedVersion> {
    let (engine_name, fragment) = parse_engine_and_version(spec);

    let unknown_engine = || SetupError::UnknownEngine {
        engine: engine_name.clone(),
        platform: platform.name(),
    };
    let engine: Engine = engine_name.parse().map_err(|_| unknown_engine())?;
    let versions = catalog
        .available_versions(platform, &engine_name)
        .ok_or_else(unknown_engine)?;

    let version = match_version(engine, &fragment, &versions).ok_or_else(|| {
        SetupError::UnknownVersion {
            engine: engine_name.clone(),
            version: fragment.clone(),
            platform: platform.name(),
            available: versions.clone(),
        }
    })?;

    let resolved = ResolvedVersion::new(engine, version);
    check_exclusions(&resolved, platform)?;
    tracing::debug!("Resolved {:?} to {} on {}", spec, resolved, platform.id());
    Ok(resolved)
}

/// Exact match, then newest stable prefix match, then newest non-head prefix
/// match. Head-like entries only ever match exactly.
pub fn match_version(engine: Engine, fragment: &str, versions: &[String]) -> Option<String> {
    if versions.iter().any(|v| v == fragment) {
        return Some(fragment.to_string());
    }

    let newest_first = || versions.iter().rev();
    newest_first()
        .find(|v| version::is_stable_version(engine, v) && v.starts_with(fragment))
        .or_else(|| {
            newest_first().find(|v| !version::is_head_version(v) && v.starts_with(fragment))
        })
        .cloned()
}

/// Facts an exclusion rule looks at
pub struct Combination {
    pub engine: Engine,
    pub float: f64,
    pub platform: Platform,
}

pub struct Exclusion {
    pub reason: &'static str,
    pub remediation: &'static str,
}

/// Known platform × engine × version combinations without working builds
pub static EXCLUSIONS: &[Rule<Combination, Exclusion>] = &[
    Rule {
        reason: "CRuby < 2.6 on macOS arm64",
        when: |c| {
            c.engine == Engine::Ruby
                && c.platform.is_macos()
                && c.platform.arch == Arch::Arm64
                && c.float < 2.6
        },
        then: Exclusion {
            reason: "CRuby < 2.6 does not support macos-arm64.",
            remediation: "Either use a newer Ruby version or use a macOS image running on amd64, e.g., macos-15-intel.",
        },
    },
    Rule {
        reason: "TruffleRuby on Windows",
        when: |c| c.engine.is_truffleruby() && c.platform.is_windows(),
        then: Exclusion {
            reason: "TruffleRuby does not currently support Windows.",
            remediation: "Use a Linux or macOS runner for TruffleRuby.",
        },
    },
];

fn check_exclusions(resolved: &ResolvedVersion, platform: &Platform) -> Result<()> {
    let combination = Combination {
        engine: resolved.engine,
        float: resolved.float()?,
        platform: platform.clone(),
    };

    match first_match(EXCLUSIONS, &combination) {
        Some(rule) => {
            tracing::debug!("Excluded combination: {}", rule.reason);
            Err(SetupError::UnsupportedCombination {
                reason: rule.then.reason.to_string(),
                remediation: rule.then.remediation.to_string(),
            })
        }
        None => Ok(()),
    }
}
