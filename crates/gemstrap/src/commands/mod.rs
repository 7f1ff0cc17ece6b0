//! CLI command implementations

pub mod cache_key;
pub mod resolve;
pub mod setup;
pub mod versions;

use anyhow::Result;
use gemstrap_core::Platform;
use gemstrap_ruby::facts::{EnvironmentFacts, SystemFacts};

/// Platform of the machine the command runs on
pub(crate) fn host_platform() -> Result<Platform> {
    Ok(SystemFacts.platform()?)
}
