//! A Java runtime JRuby can start with
//!
//! Hosted images ship several JDKs and expose each through
//! `JAVA_HOME_<major>_<arch>`, while `JAVA_HOME` may point at one too old
//! for recent JRuby releases.

use gemstrap_core::{Arch, Platform, Result, SetupError};

use crate::env::SessionEnv;
use crate::facts::EnvironmentFacts;
use crate::measure::measure;
use crate::runner::CommandRunner;

/// Java major required by JRuby 10
pub const JRUBY_JAVA_MAJOR: u32 = 21;

/// `JAVA_HOME_21_X64`, or `JAVA_HOME_21_arm64` on macOS arm64 images
pub fn java_home_var(platform: &Platform) -> String {
    let arch = if platform.is_macos() && platform.arch == Arch::Arm64 {
        "arm64"
    } else {
        "X64"
    };
    format!("JAVA_HOME_{}_{}", JRUBY_JAVA_MAJOR, arch)
}

/// Switches `JAVA_HOME` to the runner's newer JDK when JRuby does not start
/// with the current one. Returns the new `JAVA_HOME`, if it changed.
pub fn ensure_java_home(
    runner: &dyn CommandRunner,
    session: &mut SessionEnv<'_>,
    facts: &dyn EnvironmentFacts,
    platform: &Platform,
    grouped: bool,
) -> Result<Option<String>> {
    measure("Modifying JAVA_HOME for JRuby", grouped, || {
        let starts = runner.run(&session.command("ruby").arg("--version"))?;
        if starts.success() {
            tracing::info!("JRuby successfully starts, using existing JAVA_HOME");
            return Ok(None);
        }

        let variable = java_home_var(platform);
        let home = facts
            .var(&variable)
            .ok_or_else(|| SetupError::JavaHomeMissing {
                variable: variable.clone(),
                major: JRUBY_JAVA_MAJOR,
            })?;
        tracing::info!("Setting JAVA_HOME to ${} path {}", variable, home);
        session.export_variable("JAVA_HOME", &home)?;
        Ok(Some(home))
    })
}
