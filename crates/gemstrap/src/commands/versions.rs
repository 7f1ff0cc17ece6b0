//! Versions command - list the catalog for this platform

use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use gemstrap_ruby::VersionCatalog;
use serde::Serialize;

use super::host_platform;
use crate::output::{print_json, print_text};

#[derive(Debug, Serialize)]
struct VersionsOutput {
    platform: String,
    /// engine -> versions, oldest first
    engines: BTreeMap<String, Vec<String>>,
}

/// Execute `gemstrap versions [engine]`
pub fn run(engine: Option<&str>, json: bool) -> Result<()> {
    let platform = host_platform()?;
    let catalog = VersionCatalog::embedded()?;

    let mut engines = BTreeMap::new();
    match engine {
        Some(engine) => {
            let versions = catalog
                .available_versions(&platform, engine)
                .ok_or_else(|| anyhow!("unknown engine {} on {}", engine, platform.name()))?;
            engines.insert(engine.to_string(), versions);
        }
        None => {
            for engine in catalog.engines() {
                if let Some(versions) = catalog.available_versions(&platform, engine) {
                    engines.insert(engine.to_string(), versions);
                }
            }
        }
    }

    let output = VersionsOutput {
        platform: platform.id(),
        engines,
    };

    if json {
        print_json(&output)?;
    } else {
        format_human_readable(&output)?;
    }
    Ok(())
}

fn format_human_readable(output: &VersionsOutput) -> Result<()> {
    print_text(&format!("Versions on {}:", output.platform))?;
    for (engine, versions) in &output.engines {
        if versions.is_empty() {
            print_text(&format!("  {}: (none)", engine))?;
        } else {
            print_text(&format!("  {}: {}", engine, versions.join(", ")))?;
        }
    }
    Ok(())
}
