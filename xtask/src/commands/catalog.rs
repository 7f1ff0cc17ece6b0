use crate::commands::matrix::build_matrix;
use anyhow::{Context, Result, bail};
use gemstrap_ruby::catalog::{VersionCatalog, WindowsRelease};
use gemstrap_ruby::version::is_head_version;
use log::info;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const BUILDER_FILE: &str = "ruby-builder-versions.json";
pub const WINDOWS_FILE: &str = "windows-versions.json";

/// engine -> versions, releases first, head-like builds last
pub type BuilderVersions = BTreeMap<String, Vec<String>>;

pub enum CatalogAction {
    AddVersion { versions: Vec<String> },
    Verify,
    Matrix,
}

pub struct CatalogCommand {
    pub data_dir: PathBuf,
    pub action: CatalogAction,
}

impl crate::commands::Command for CatalogCommand {
    fn run(&self) -> Result<()> {
        match &self.action {
            CatalogAction::AddVersion { versions } => self.add_versions(versions),
            CatalogAction::Verify => self.verify(),
            CatalogAction::Matrix => self.matrix(),
        }
    }
}

impl CatalogCommand {
    pub fn new(data_dir: PathBuf, action: CatalogAction) -> Self {
        Self { data_dir, action }
    }

    fn add_versions(&self, versions: &[String]) -> Result<()> {
        if versions.is_empty() {
            bail!("No versions given, expected e.g. ruby-3.4.8,jruby-10.0.3.0");
        }

        let path = self.data_dir.join(BUILDER_FILE);
        let mut catalog: BuilderVersions = read_json(&path)?;

        for engine_version in versions {
            let (engine, version) = split_engine_version(engine_version)?;
            if add_version(&mut catalog, engine, version)? {
                info!("Added {engine}-{version}");
            } else {
                info!("{engine}-{version} is already listed");
            }
        }

        write_json(&path, &catalog)
    }

    fn verify(&self) -> Result<()> {
        let builder_path = self.data_dir.join(BUILDER_FILE);
        let windows_path = self.data_dir.join(WINDOWS_FILE);
        let builder = fs::read_to_string(&builder_path)
            .with_context(|| format!("Failed to read {}", builder_path.display()))?;
        let windows = fs::read_to_string(&windows_path)
            .with_context(|| format!("Failed to read {}", windows_path.display()))?;

        // Duplicates are rejected by the same loader the binary uses
        VersionCatalog::from_json(&builder, &windows)?;

        let versions: BuilderVersions = serde_json::from_str(&builder)?;
        let misplaced = misplaced_head_versions(&versions);
        if !misplaced.is_empty() {
            bail!(
                "Releases listed after head-like builds in {}: {:?}",
                BUILDER_FILE,
                misplaced
            );
        }

        info!("Verify ok: {} engines, no duplicates", versions.len());
        Ok(())
    }

    fn matrix(&self) -> Result<()> {
        let builder: BuilderVersions = read_json(&self.data_dir.join(BUILDER_FILE))?;
        let windows: Vec<WindowsRelease> = read_json(&self.data_dir.join(WINDOWS_FILE))?;

        let matrix = build_matrix(&builder, &windows);
        info!("{} matrix entries", matrix.len());
        println!("{}", serde_json::to_string(&matrix)?);
        Ok(())
    }
}

/// `truffleruby+graalvm-24.1.2` -> (`truffleruby+graalvm`, `24.1.2`)
pub fn split_engine_version(engine_version: &str) -> Result<(&str, &str)> {
    engine_version
        .split_once('-')
        .filter(|(engine, version)| !engine.is_empty() && !version.is_empty())
        .with_context(|| format!("Expected <engine>-<version>, got {engine_version:?}"))
}

/// Whether `version` looks like a release of `engine`.
///
/// CRuby and JRuby releases have at least three components, TruffleRuby at
/// least two.
pub fn is_release_version(engine: &str, version: &str) -> Result<bool> {
    let numeric = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    let components: Vec<&str> = version.split('.').collect();

    let leading = match engine {
        "ruby" | "jruby" => 2,
        "truffleruby" | "truffleruby+graalvm" => 1,
        other => bail!("Unknown engine {other}"),
    };
    Ok(components.len() > leading && components[..leading].iter().all(|c| numeric(*c)))
}

/// Inserts a release before the head-like entries of `engine`.
///
/// Returns `false` when the version is already listed.
pub fn add_version(catalog: &mut BuilderVersions, engine: &str, version: &str) -> Result<bool> {
    if !is_release_version(engine, version)? {
        bail!("{version} is not a release version of {engine}");
    }

    let versions = catalog
        .get_mut(engine)
        .with_context(|| format!("Could not find {engine} in {BUILDER_FILE}"))?;
    if versions.iter().any(|v| v == version) {
        return Ok(false);
    }

    let at = versions
        .iter()
        .position(|v| is_head_version(v))
        .unwrap_or(versions.len());
    versions.insert(at, version.to_string());
    Ok(true)
}

/// Releases that come after a head-like entry, as `engine-version`
pub fn misplaced_head_versions(catalog: &BuilderVersions) -> Vec<String> {
    let mut misplaced = Vec::new();
    for (engine, versions) in catalog {
        let releases = versions.iter().skip_while(|v| !is_head_version(v));
        for version in releases.filter(|v| !is_head_version(v)) {
            misplaced.push(format!("{engine}-{version}"));
        }
    }
    misplaced
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Pretty-printed with a trailing newline, replaced atomically
fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(serde_json::to_string_pretty(value)?.as_bytes())?;
    file.write_all(b"\n")?;
    file.persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
