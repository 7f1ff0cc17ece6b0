//! Environment changes for the current run and for later CI steps
//!
//! Changes are recorded twice: in an [`EnvOverlay`] that commands spawned by
//! this process inherit, and through an [`EnvExporter`] so steps after this
//! one see them too. The process environment itself is never mutated.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use gemstrap_core::Result;
use regex::Regex;
use uuid::Uuid;

use crate::runner::CommandSpec;

/// Publishes environment changes to whatever runs after this process
pub trait EnvExporter {
    fn export_variable(&mut self, name: &str, value: &str) -> Result<()>;

    /// Prepends `entries`, in order, to PATH
    fn add_path(&mut self, entries: &[PathBuf]) -> Result<()>;

    fn set_output(&mut self, name: &str, value: &str) -> Result<()>;
}

/// Appends to the files GitHub Actions reads between steps
#[derive(Debug, Clone)]
pub struct GithubExporter {
    env_file: PathBuf,
    path_file: PathBuf,
    output_file: Option<PathBuf>,
    path_separator: &'static str,
}

impl GithubExporter {
    pub fn new(env_file: PathBuf, path_file: PathBuf, output_file: Option<PathBuf>) -> Self {
        Self {
            env_file,
            path_file,
            output_file,
            path_separator: if cfg!(windows) { ";" } else { ":" },
        }
    }

    /// Uses `$GITHUB_ENV`, `$GITHUB_PATH` and `$GITHUB_OUTPUT` when the first
    /// two are set.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Option<Self> {
        Some(Self::new(
            var("GITHUB_ENV")?.into(),
            var("GITHUB_PATH")?.into(),
            var("GITHUB_OUTPUT").map(PathBuf::from),
        ))
    }

    fn append(path: &Path, content: &str) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }

    /// Multi-line values use a heredoc with a fresh delimiter, so a value
    /// cannot close it early
    fn key_value(name: &str, value: &str) -> String {
        if value.contains('\n') {
            let delimiter = format!("ghadelimiter_{}", Uuid::new_v4());
            format!("{}<<{}\n{}\n{}\n", name, delimiter, value, delimiter)
        } else {
            format!("{}={}\n", name, value)
        }
    }
}

impl EnvExporter for GithubExporter {
    fn export_variable(&mut self, name: &str, value: &str) -> Result<()> {
        Self::append(&self.env_file, &Self::key_value(name, value))
    }

    fn add_path(&mut self, entries: &[PathBuf]) -> Result<()> {
        let joined = entries
            .iter()
            .map(|e| e.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(self.path_separator);
        Self::append(&self.path_file, &format!("{}\n", joined))
    }

    fn set_output(&mut self, name: &str, value: &str) -> Result<()> {
        match &self.output_file {
            Some(path) => Self::append(path, &Self::key_value(name, value)),
            None => Ok(()),
        }
    }
}

/// Prints POSIX shell `export` lines, for `eval "$(gemstrap setup)"`
pub struct ShellExporter<W: Write> {
    out: W,
}

impl<W: Write> ShellExporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

impl<W: Write> EnvExporter for ShellExporter<W> {
    fn export_variable(&mut self, name: &str, value: &str) -> Result<()> {
        writeln!(self.out, "export {}={}", name, shell_quote(value))?;
        Ok(())
    }

    fn add_path(&mut self, entries: &[PathBuf]) -> Result<()> {
        let joined = entries
            .iter()
            .map(|e| e.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(":");
        writeln!(self.out, "export PATH={}:\"$PATH\"", shell_quote(&joined))?;
        Ok(())
    }

    fn set_output(&mut self, name: &str, value: &str) -> Result<()> {
        writeln!(self.out, "# {}={}", name, value)?;
        Ok(())
    }
}

/// Environment seen by commands this process spawns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvOverlay {
    vars: BTreeMap<String, String>,
    path: Vec<String>,
    windows: bool,
}

impl EnvOverlay {
    /// `current_path` is the inherited PATH value
    pub fn new(current_path: &str, windows: bool) -> Self {
        let separator = if windows { ';' } else { ':' };
        Self {
            vars: BTreeMap::new(),
            path: current_path
                .split(separator)
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect(),
            windows,
        }
    }

    /// `Path` on Windows, `PATH` elsewhere
    pub fn path_var(&self) -> &'static str {
        if self.windows { "Path" } else { "PATH" }
    }

    pub fn path_entries(&self) -> &[String] {
        &self.path
    }

    pub fn path_value(&self) -> String {
        self.path.join(if self.windows { ";" } else { ":" })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn set_path(&mut self, entries: Vec<String>) {
        self.path = entries;
    }

    pub fn prepend_path(&mut self, entries: &[PathBuf]) {
        let new_entries = entries.iter().map(|e| e.to_string_lossy().into_owned());
        self.path = new_entries.chain(self.path.drain(..)).collect();
    }

    /// A command that sees every change recorded so far
    pub fn command(&self, program: impl Into<String>) -> CommandSpec {
        let mut spec = CommandSpec::new(program);
        for (name, value) in &self.vars {
            spec = spec.env(name, value);
        }
        spec.env(self.path_var(), self.path_value())
    }
}

/// The overlay and the exporter, kept in step
pub struct SessionEnv<'a> {
    overlay: EnvOverlay,
    exporter: &'a mut dyn EnvExporter,
}

impl<'a> SessionEnv<'a> {
    pub fn new(overlay: EnvOverlay, exporter: &'a mut dyn EnvExporter) -> Self {
        Self { overlay, exporter }
    }

    pub fn overlay(&self) -> &EnvOverlay {
        &self.overlay
    }

    pub fn command(&self, program: impl Into<String>) -> CommandSpec {
        self.overlay.command(program)
    }

    pub fn export_variable(&mut self, name: &str, value: &str) -> Result<()> {
        self.overlay.set(name, value);
        self.exporter.export_variable(name, value)
    }

    pub fn add_path(&mut self, entries: &[PathBuf]) -> Result<()> {
        self.overlay.prepend_path(entries);
        self.exporter.add_path(entries)
    }

    pub fn set_output(&mut self, name: &str, value: &str) -> Result<()> {
        self.exporter.set_output(name, value)
    }

    /// Drops PATH entries of other Ruby installations, then prepends
    /// `new_entries`.
    pub fn setup_path(&mut self, new_entries: &[PathBuf]) -> Result<()> {
        let (removed, kept): (Vec<String>, Vec<String>) = self
            .overlay
            .path_entries()
            .iter()
            .cloned()
            .partition(|entry| is_ruby_path_entry(entry));

        if !removed.is_empty() {
            tracing::info!("Entries removed from PATH to avoid conflicts with default Ruby:");
            for entry in &removed {
                tracing::info!("  {}", entry);
            }
            self.overlay.set_path(kept);
            let path_var = self.overlay.path_var();
            let path_value = self.overlay.path_value();
            self.exporter.export_variable(path_var, &path_value)?;
        }

        tracing::info!(
            "Entries added to PATH to use selected Ruby:\n  {}",
            new_entries
                .iter()
                .map(|e| e.display().to_string())
                .collect::<Vec<_>>()
                .join("\n  ")
        );
        self.add_path(new_entries)
    }
}

static RUBY_PATH_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bruby\b").expect("valid PATH filter"));

/// PATH entries belonging to some Ruby installation
pub fn is_ruby_path_entry(entry: &str) -> bool {
    RUBY_PATH_ENTRY.is_match(entry)
}

/// Variables a Windows runtime needs that the runner image does not set
pub fn windows_variables(
    var: impl Fn(&str) -> Option<String>,
    prefix: &Path,
) -> Vec<(String, String)> {
    let mut vars = Vec::new();
    if let Some(temp) = var("RUNNER_TEMP") {
        vars.push(("TMPDIR".to_string(), temp));
    }
    if let Some(profile) = var("USERPROFILE") {
        vars.push(("HOME".to_string(), profile));
    }
    vars.push(("MSYS2_PATH_TYPE".to_string(), "inherit".to_string()));

    let cert = prefix.join("ssl").join("cert.pem");
    if cert.is_file() {
        vars.push((
            "SSL_CERT_FILE".to_string(),
            cert.to_string_lossy().into_owned(),
        ));
    }
    vars
}
