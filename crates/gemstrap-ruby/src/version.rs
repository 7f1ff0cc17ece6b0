//! Engines, version classification and float approximations
//!
//! Threshold rules compare `major.minor` floats; head-like builds parse to
//! [`HEAD_FLOAT`] so every `>=` check treats them as newest. A few rules need
//! patch precision and match string prefixes instead, see
//! [`crate::policy::bundler`].

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use gemstrap_core::{Result, SetupError};
use regex::Regex;

/// Rolling development builds, only ever matched exactly
pub const HEAD_VERSIONS: &[&str] = &["head", "debug", "mingw", "mswin", "ucrt", "asan"];

/// Float value of head-like versions
pub const HEAD_FLOAT: f64 = 999.999;

/// Target Ruby version for engine releases we know nothing about
pub const UNKNOWN_TARGET_RUBY_VERSION: f64 = 9.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Engine {
    Ruby,
    JRuby,
    TruffleRuby,
    TruffleRubyGraalVM,
}

impl Engine {
    pub const ALL: [Engine; 4] = [
        Engine::Ruby,
        Engine::JRuby,
        Engine::TruffleRuby,
        Engine::TruffleRubyGraalVM,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Ruby => "ruby",
            Engine::JRuby => "jruby",
            Engine::TruffleRuby => "truffleruby",
            Engine::TruffleRubyGraalVM => "truffleruby+graalvm",
        }
    }

    /// Directory name under the runner tool cache
    pub fn tool_cache_name(&self) -> &'static str {
        match self {
            Engine::Ruby => "Ruby",
            Engine::JRuby => "JRuby",
            Engine::TruffleRuby => "TruffleRuby",
            Engine::TruffleRubyGraalVM => "TruffleRubyGraalVM",
        }
    }

    pub fn is_truffleruby(&self) -> bool {
        matches!(self, Engine::TruffleRuby | Engine::TruffleRubyGraalVM)
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for Engine {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Engine::ALL
            .into_iter()
            .find(|engine| engine.as_str() == s)
            .ok_or(())
    }
}

pub fn is_head_version(version: &str) -> bool {
    HEAD_VERSIONS.contains(&version)
}

/// Strict release versions, eligible for the first prefix-matching pass
///
/// CRuby releases have exactly three components (previews and `-pNNN`
/// suffixes are not stable), JRuby has four, TruffleRuby any number.
pub fn is_stable_version(engine: Engine, version: &str) -> bool {
    let components: Vec<&str> = version.split('.').collect();
    let numeric = components
        .iter()
        .all(|c| !c.is_empty() && c.chars().all(|ch| ch.is_ascii_digit()));
    if !numeric {
        return false;
    }

    match engine {
        Engine::Ruby => components.len() == 3,
        Engine::JRuby => components.len() >= 3,
        Engine::TruffleRuby | Engine::TruffleRubyGraalVM => !components.is_empty(),
    }
}

static MAJOR_MINOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+").expect("valid major.minor pattern"));
static MAJOR_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("valid major pattern"));

/// `major.minor` approximation of a version.
///
/// `2.7.8` is `2.7`, `3.0.0-preview1` is `3.0` and a bare `10` is `10.0`.
/// Head-like versions are [`HEAD_FLOAT`].
pub fn float_version(version: &str) -> Result<f64> {
    let parsed = if let Some(found) = MAJOR_MINOR.find(version) {
        found.as_str()
    } else if is_head_version(version) {
        return Ok(HEAD_FLOAT);
    } else if MAJOR_ONLY.is_match(version) {
        version
    } else {
        return Err(SetupError::VersionParse(version.to_string()));
    };

    parsed
        .parse::<f64>()
        .map_err(|_| SetupError::VersionParse(version.to_string()))
}

/// The CRuby version an engine release is compatible with
pub fn target_ruby_version(engine: Engine, version: &str) -> Result<f64> {
    let float = float_version(version)?;
    let target = match engine {
        Engine::Ruby => float,
        Engine::JRuby => match jruby_series(float) {
            Some("9.1") => 2.3,
            Some("9.2") => 2.5,
            Some("9.3") => 2.6,
            Some("9.4") => 3.1,
            Some("10.0") => 3.4,
            _ => UNKNOWN_TARGET_RUBY_VERSION,
        },
        Engine::TruffleRuby | Engine::TruffleRubyGraalVM => {
            if float < 21.0 {
                2.6
            } else if float < 22.0 {
                2.7
            } else if float < 23.1 {
                3.0
            } else if float < 24.2 {
                3.2
            } else {
                3.3
            }
        }
    };
    Ok(target)
}

fn jruby_series(float: f64) -> Option<&'static str> {
    const SERIES: [(f64, &str); 5] = [
        (9.1, "9.1"),
        (9.2, "9.2"),
        (9.3, "9.3"),
        (9.4, "9.4"),
        (10.0, "10.0"),
    ];
    SERIES
        .iter()
        .find(|(value, _)| (float - value).abs() < f64::EPSILON)
        .map(|(_, name)| *name)
}

/// Runtimes shipping Bundler 1 as a default gem
pub fn is_bundler1_default(engine: Engine, version: &str) -> Result<bool> {
    let float = float_version(version)?;
    Ok(match engine {
        Engine::Ruby => (2.6..2.7).contains(&float),
        Engine::TruffleRuby | Engine::TruffleRubyGraalVM => float < 21.0,
        Engine::JRuby => (9.2..9.3).contains(&float),
    })
}

/// Runtimes shipping Bundler 2 or later as a default gem
pub fn is_bundler2_plus_default(engine: Engine, version: &str) -> Result<bool> {
    let float = float_version(version)?;
    Ok(match engine {
        Engine::Ruby => float >= 2.7,
        Engine::TruffleRuby | Engine::TruffleRubyGraalVM => float >= 21.0,
        Engine::JRuby => float >= 9.3,
    })
}

/// Runtimes shipping Bundler 2.2 or later as a default gem
pub fn is_bundler2dot2_plus_default(engine: Engine, version: &str) -> Result<bool> {
    let float = float_version(version)?;
    Ok(match engine {
        Engine::Ruby => float >= 3.1,
        Engine::TruffleRuby | Engine::TruffleRubyGraalVM => float >= 22.0,
        Engine::JRuby => float >= 9.4,
    })
}

/// Runtimes shipping Bundler 4 or later as a default gem
pub fn is_bundler4_plus_default(engine: Engine, version: &str) -> Result<bool> {
    let float = float_version(version)?;
    Ok(match engine {
        Engine::Ruby => float >= 4.0,
        _ => false,
    })
}

pub fn has_bundler_default_gem(engine: Engine, version: &str) -> Result<bool> {
    Ok(is_bundler1_default(engine, version)? || is_bundler2_plus_default(engine, version)?)
}
