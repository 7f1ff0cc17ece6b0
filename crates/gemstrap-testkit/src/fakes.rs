//! Recording fakes for the collaborator traits
//!
//! Fakes that take an [`EventLog`] append to it, so a test can assert on
//! the interleaving of cache, install and command calls.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use gemstrap_core::{Arch, OsFamily, Platform, Result};
use gemstrap_ruby::cache::{BackendError, CacheBackend, DependencyInstaller};
use gemstrap_ruby::env::EnvExporter;
use gemstrap_ruby::facts::EnvironmentFacts;
use gemstrap_ruby::install::{InstallRequest, InstalledRuntime, RuntimeInstaller};
use gemstrap_ruby::runner::{CommandOutput, CommandRunner, CommandSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Restore { key: String, restore_keys: Vec<String> },
    Save { key: String },
    Install,
    Check,
    Clean,
    /// `CommandSpec::display()` of a command that ran
    Command(String),
    InstallRuntime(String),
}

#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Event>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, event: Event) {
        self.lock().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().clone()
    }

    /// Display strings of the recorded commands, in order
    pub fn commands(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                Event::Command(command) => Some(command.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn position(&self, event: &Event) -> Option<usize> {
        self.lock().iter().position(|e| e == event)
    }

    pub fn contains(&self, event: &Event) -> bool {
        self.position(event).is_some()
    }

    pub fn count(&self, matches: impl Fn(&Event) -> bool) -> usize {
        self.lock().iter().filter(|e| matches(e)).count()
    }
}

/// Cache backend with scripted results
pub struct FakeCacheBackend {
    log: EventLog,
    restore: std::result::Result<Option<String>, BackendError>,
    save: std::result::Result<(), BackendError>,
}

impl FakeCacheBackend {
    /// Misses on restore, succeeds on save
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            restore: Ok(None),
            save: Ok(()),
        }
    }

    pub fn restoring(mut self, key: impl Into<String>) -> Self {
        self.restore = Ok(Some(key.into()));
        self
    }

    pub fn restore_error(mut self, error: BackendError) -> Self {
        self.restore = Err(error);
        self
    }

    pub fn save_error(mut self, error: BackendError) -> Self {
        self.save = Err(error);
        self
    }
}

impl CacheBackend for FakeCacheBackend {
    fn restore(
        &self,
        _paths: &[PathBuf],
        key: &str,
        restore_keys: &[String],
    ) -> std::result::Result<Option<String>, BackendError> {
        self.log.push(Event::Restore {
            key: key.to_string(),
            restore_keys: restore_keys.to_vec(),
        });
        self.restore.clone()
    }

    fn save(&self, _paths: &[PathBuf], key: &str) -> std::result::Result<(), BackendError> {
        self.log.push(Event::Save {
            key: key.to_string(),
        });
        self.save.clone()
    }
}

/// Dependency installer that only records calls
pub struct FakeDependencyInstaller {
    log: EventLog,
    check_passes: bool,
}

impl FakeDependencyInstaller {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            check_passes: true,
        }
    }

    pub fn failing_check(mut self) -> Self {
        self.check_passes = false;
        self
    }
}

impl DependencyInstaller for FakeDependencyInstaller {
    fn install(&self) -> Result<()> {
        self.log.push(Event::Install);
        Ok(())
    }

    fn check(&self) -> Result<bool> {
        self.log.push(Event::Check);
        Ok(self.check_passes)
    }

    fn clean(&self) -> Result<()> {
        self.log.push(Event::Clean);
        Ok(())
    }
}

/// Command runner that never spawns anything.
///
/// Commands succeed with empty output unless a scripted response matches:
/// the first response whose pattern is a substring of the command's
/// display string wins.
pub struct RecordingRunner {
    log: EventLog,
    responses: Vec<(String, CommandOutput)>,
    specs: Mutex<Vec<CommandSpec>>,
}

impl RecordingRunner {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            responses: Vec::new(),
            specs: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(mut self, pattern: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.responses.push((
            pattern.into(),
            CommandOutput {
                code: Some(0),
                stdout: stdout.into(),
            },
        ));
        self
    }

    pub fn fail(mut self, pattern: impl Into<String>, code: i32) -> Self {
        self.responses.push((
            pattern.into(),
            CommandOutput {
                code: Some(code),
                stdout: String::new(),
            },
        ));
        self
    }

    /// Every command that ran, with its environment and working directory
    pub fn specs(&self) -> Vec<CommandSpec> {
        self.specs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// The first command whose display string contains `pattern`
    pub fn find(&self, pattern: &str) -> Option<CommandSpec> {
        self.specs()
            .into_iter()
            .find(|spec| spec.display().contains(pattern))
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let display = spec.display();
        self.log.push(Event::Command(display.clone()));
        self.specs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(spec.clone());

        Ok(self
            .responses
            .iter()
            .find(|(pattern, _)| display.contains(pattern.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or(CommandOutput {
                code: Some(0),
                stdout: String::new(),
            }))
    }
}

/// Runtime installer that creates an empty `<root>/<engine>-<version>/bin`
pub struct FakeInstaller {
    log: EventLog,
    root: PathBuf,
    requests: Mutex<Vec<InstallRequest>>,
}

impl FakeInstaller {
    pub fn new(log: &EventLog, root: impl Into<PathBuf>) -> Self {
        Self {
            log: log.clone(),
            root: root.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<InstallRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl RuntimeInstaller for FakeInstaller {
    fn install(&self, request: &InstallRequest) -> Result<InstalledRuntime> {
        self.log
            .push(Event::InstallRuntime(request.resolved.to_string()));
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        let prefix = self.root.join(request.resolved.to_string());
        fs::create_dir_all(prefix.join("bin"))?;
        Ok(InstalledRuntime {
            bin_dirs: vec![prefix.join("bin")],
            prefix,
            reused: false,
        })
    }
}

/// Collects exports in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryExporter {
    pub variables: Vec<(String, String)>,
    pub paths: Vec<PathBuf>,
    pub outputs: Vec<(String, String)>,
}

impl MemoryExporter {
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn output(&self, name: &str) -> Option<&str> {
        self.outputs
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

impl EnvExporter for MemoryExporter {
    fn export_variable(&mut self, name: &str, value: &str) -> Result<()> {
        self.variables.push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn add_path(&mut self, entries: &[PathBuf]) -> Result<()> {
        let mut paths = entries.to_vec();
        paths.append(&mut self.paths);
        self.paths = paths;
        Ok(())
    }

    fn set_output(&mut self, name: &str, value: &str) -> Result<()> {
        self.outputs.push((name.to_string(), value.to_string()));
        Ok(())
    }
}

/// A GitHub-hosted Ubuntu runner unless told otherwise
#[derive(Debug, Clone)]
pub struct FakeFacts {
    pub platform: Platform,
    pub vars: HashMap<String, String>,
    pub cpus: usize,
    pub home: PathBuf,
}

impl FakeFacts {
    pub fn new(home: &Path) -> Self {
        let vars = [
            ("ImageOS", "ubuntu24"),
            ("PATH", "/usr/local/bin:/usr/bin:/bin"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            platform: Platform::new(OsFamily::Ubuntu, "24.04", Arch::X64),
            vars,
            cpus: 4,
            home: home.to_path_buf(),
        }
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn var(mut self, name: &str, value: &str) -> Self {
        self.vars.insert(name.to_string(), value.to_string());
        self
    }

    pub fn without_var(mut self, name: &str) -> Self {
        self.vars.remove(name);
        self
    }
}

impl EnvironmentFacts for FakeFacts {
    fn platform(&self) -> Result<Platform> {
        Ok(self.platform.clone())
    }

    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).filter(|v| !v.is_empty()).cloned()
    }

    fn cpus(&self) -> usize {
        self.cpus
    }

    fn home_dir(&self) -> Option<PathBuf> {
        Some(self.home.clone())
    }
}
