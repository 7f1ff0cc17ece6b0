//! Resolve command - catalog lookup without installing

use anyhow::Result;
use gemstrap_ruby::{VersionCatalog, resolve};
use serde::Serialize;

use super::host_platform;
use crate::output::{print_json, print_text};

#[derive(Debug, Serialize)]
struct ResolveOutput {
    spec: String,
    platform: String,
    engine: String,
    version: String,
}

/// Execute `gemstrap resolve <spec>`
pub fn run(spec: &str, json: bool) -> Result<()> {
    let platform = host_platform()?;
    let catalog = VersionCatalog::embedded()?;
    let resolved = resolve(spec, &platform, &catalog)?;

    if json {
        print_json(&ResolveOutput {
            spec: spec.to_string(),
            platform: platform.id(),
            engine: resolved.engine.to_string(),
            version: resolved.version,
        })?;
    } else {
        print_text(&resolved.to_string())?;
    }
    Ok(())
}
