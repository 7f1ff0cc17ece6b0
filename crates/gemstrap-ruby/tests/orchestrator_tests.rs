//! End-to-end runs of the setup sequence against fakes

use std::path::{Path, PathBuf};

use gemstrap_core::config::Config;
use gemstrap_core::digest::sha256_hex;
use gemstrap_core::{Arch, OsFamily, Platform, SetupError};
use gemstrap_ruby::{Services, SetupOptions, SetupReport, VersionCatalog, install_runtime};
use gemstrap_testkit::fixtures::{
    lockfile_contents, write_gemfile, write_lockfile, write_ruby_version,
};
use gemstrap_testkit::{
    Event, EventLog, FakeCacheBackend, FakeFacts, FakeInstaller, MemoryExporter, RecordingRunner,
};
use tempfile::TempDir;

struct Harness {
    temp: TempDir,
    log: EventLog,
    facts: FakeFacts,
    catalog: VersionCatalog,
    runner: RecordingRunner,
    installer: FakeInstaller,
    cache: FakeCacheBackend,
    exporter: MemoryExporter,
}

impl Harness {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let log = EventLog::new();
        let facts = FakeFacts::new(&temp.path().join("home"))
            .var("RUNNER_TOOL_CACHE", &temp.path().join("toolcache").to_string_lossy());
        Self {
            runner: RecordingRunner::new(&log),
            installer: FakeInstaller::new(&log, temp.path().join("rubies")),
            cache: FakeCacheBackend::new(&log),
            catalog: VersionCatalog::embedded().unwrap(),
            exporter: MemoryExporter::default(),
            facts,
            log,
            temp,
        }
    }

    fn project(&self) -> PathBuf {
        self.temp.path().join("project")
    }

    fn options(&self, config: &str) -> SetupOptions {
        let config: Config = toml::from_str(config).unwrap();
        SetupOptions::from_config(&config, &self.project()).unwrap()
    }

    fn run(&mut self, options: &SetupOptions) -> gemstrap_core::Result<SetupReport> {
        let services = Services {
            facts: &self.facts,
            catalog: &self.catalog,
            runner: &self.runner,
            installer: &self.installer,
            cache: &self.cache,
        };
        install_runtime(options, &services, &mut self.exporter)
    }
}

fn bundler_project(dir: &Path, ruby: &str, bundled_with: Option<&str>) {
    write_ruby_version(dir, ruby);
    write_gemfile(dir);
    write_lockfile(dir, bundled_with);
}

#[test]
fn test_full_run_with_bundler_cache() {
    let mut h = Harness::new();
    bundler_project(&h.project(), "3.3.6", Some("2.5.22"));
    let options = h.options("[bundler]\ncache = true\n");

    let report = h.run(&options).unwrap();

    assert_eq!(report.engine, "ruby");
    assert_eq!(report.version, "3.3.6");
    assert_eq!(report.bundler.as_deref(), Some("2.5.22"));
    assert!(!report.rubygems_updated);

    let prefix = h.temp.path().join("rubies/ruby-3.3.6");
    assert_eq!(report.prefix, prefix);
    assert_eq!(h.exporter.paths.first(), Some(&prefix.join("bin")));
    assert_eq!(
        h.exporter.output("ruby-prefix"),
        Some(&*prefix.to_string_lossy())
    );

    let commands = h.log.commands();
    assert!(commands.iter().any(|c| c.ends_with("gem install bundler -v 2.5.22")));
    let install_path = h.project().join("vendor/bundle");
    assert!(commands.contains(&format!(
        "bundle config set --local path {}",
        install_path.display()
    )));
    assert!(commands.contains(&"bundle config set --local deployment true".to_string()));
    assert!(commands.contains(&"bundle install --jobs 4".to_string()));

    let cache = report.cache.unwrap();
    assert!(!cache.from_cache);
    assert!(cache.saved);
}

#[test]
fn test_cache_key_uses_lockfile_digest() {
    let mut h = Harness::new();
    bundler_project(&h.project(), "3.3.6", Some("2.5.22"));
    let options = h.options("[bundler]\ncache = true\n");

    h.run(&options).unwrap();

    let digest = sha256_hex(lockfile_contents(Some("2.5.22")).as_bytes());
    let saved = h
        .log
        .events()
        .into_iter()
        .find_map(|e| match e {
            Event::Save { key } => Some(key),
            _ => None,
        })
        .unwrap();
    assert!(saved.starts_with("gemstrap-bundler-cache-v6-ubuntu-24.04-x64-ruby-3.3.6-wd-"));
    assert!(saved.ends_with(&format!("-Gemfile.lock-{}", digest)));
}

#[test]
fn test_restore_happens_before_install_and_save_after() {
    let mut h = Harness::new();
    bundler_project(&h.project(), "3.3.6", Some("2.5.22"));
    let options = h.options("[bundler]\ncache = true\n");

    h.run(&options).unwrap();

    let events = h.log.events();
    let restore = events
        .iter()
        .position(|e| matches!(e, Event::Restore { .. }))
        .unwrap();
    let install = h
        .log
        .position(&Event::Command("bundle install --jobs 4".to_string()))
        .unwrap();
    let save = events
        .iter()
        .position(|e| matches!(e, Event::Save { .. }))
        .unwrap();
    assert!(restore < install);
    assert!(install < save);
}

#[test]
fn test_bundler_version_pinned_for_config_commands() {
    let mut h = Harness::new();
    bundler_project(&h.project(), "3.3.6", Some("2.5.22"));
    let options = h.options("[bundler]\ncache = true\n");

    h.run(&options).unwrap();

    let config = h.runner.find("bundle config set --local deployment").unwrap();
    assert_eq!(
        config.env.get("BUNDLER_VERSION").map(String::as_str),
        Some("2.5.22")
    );
    assert_eq!(config.cwd.as_deref(), Some(h.project().as_path()));

    let install = h.runner.find("bundle install").unwrap();
    assert!(!install.env.contains_key("BUNDLER_VERSION"));
    let path = install.env.get("PATH").unwrap();
    assert!(path.starts_with(&*h.temp.path().join("rubies/ruby-3.3.6/bin").to_string_lossy()));
}

#[test]
fn test_no_save_event_restores_only() {
    let mut h = Harness::new();
    h.facts = h.facts.clone().var("GITHUB_EVENT_NAME", "merge_group");
    bundler_project(&h.project(), "3.3.6", Some("2.5.22"));
    let options = h.options("[bundler]\ncache = true\n");

    let report = h.run(&options).unwrap();

    assert!(!report.cache.unwrap().saved);
    assert_eq!(h.log.count(|e| matches!(e, Event::Save { .. })), 0);
    assert_eq!(h.log.count(|e| matches!(e, Event::Restore { .. })), 1);
}

#[test]
fn test_head_build_keys_include_abi() {
    let mut h = Harness::new();
    h.runner = RecordingRunner::new(&h.log).respond("RbConfig", "3.5.0+0");
    bundler_project(&h.project(), "head", Some("2.5.22"));
    let options = h.options("[bundler]\ncache = true\n");

    let report = h.run(&options).unwrap();

    assert_eq!(report.version, "head");
    let restore_keys = h
        .log
        .events()
        .into_iter()
        .find_map(|e| match e {
            Event::Restore { restore_keys, .. } => Some(restore_keys),
            _ => None,
        })
        .unwrap();
    assert!(restore_keys[0].contains("-ruby-head-"));
    assert!(restore_keys[0].ends_with("-ABI-3.5.0+0-Gemfile.lock-"));

    // head builds are not relocatable
    let requests = h.installer.requests();
    let request = &requests[0];
    assert!(request.tool_cache.is_none());
}

#[test]
fn test_release_builds_go_to_tool_cache() {
    let mut h = Harness::new();
    write_ruby_version(&h.project(), "3.3.6");
    let options = h.options("[bundler]\nversion = \"none\"\n");

    h.run(&options).unwrap();

    let requests = h.installer.requests();
    let request = &requests[0];
    let tool_cache = request.tool_cache.as_ref().unwrap();
    assert_eq!(tool_cache.root(), h.temp.path().join("toolcache"));
    assert!(request.self_hosted.is_none());
}

#[test]
fn test_rubygems_latest_updates_and_brings_bundler() {
    let mut h = Harness::new();
    bundler_project(&h.project(), "3.3.6", Some("2.5.22"));
    let options = h.options("[rubygems]\nversion = \"latest\"\n");

    let report = h.run(&options).unwrap();

    assert!(report.rubygems_updated);
    assert_eq!(report.bundler.as_deref(), Some("unknown"));
    let commands = h.log.commands();
    assert!(commands.iter().any(|c| c.ends_with("gem update --system")));
    assert!(!commands.iter().any(|c| c.contains("install bundler")));
    assert!(report.cache.is_none());
}

#[test]
fn test_rubygems_explicit_version_not_newer_is_skipped() {
    let mut h = Harness::new();
    h.runner = RecordingRunner::new(&h.log).respond("gem --version", "3.5.22\n");
    write_ruby_version(&h.project(), "3.3.6");
    let options = h.options("[rubygems]\nversion = \"3.4.0\"\n[bundler]\nversion = \"none\"\n");

    h.run(&options).unwrap();

    let commands = h.log.commands();
    assert!(commands.iter().any(|c| c.ends_with("gem --version")));
    assert!(!commands.iter().any(|c| c.contains("update --system")));
}

#[test]
fn test_old_ruby_gets_bundler_1() {
    let mut h = Harness::new();
    bundler_project(&h.project(), "2.2.10", None);
    let options = h.options("[bundler]\nversion = \"latest\"\n");

    let report = h.run(&options).unwrap();

    assert_eq!(report.bundler.as_deref(), Some("1"));
    assert!(
        h.log
            .commands()
            .iter()
            .any(|c| c.ends_with("gem install bundler -v ~> 1.0"))
    );
}

#[test]
fn test_install_step_failure_aborts() {
    let mut h = Harness::new();
    h.runner = RecordingRunner::new(&h.log).fail("bundle install", 5);
    bundler_project(&h.project(), "3.3.6", Some("2.5.22"));
    let options = h.options("[bundler]\ncache = true\n");

    let err = h.run(&options).unwrap_err();

    match err {
        SetupError::InstallStepFailure { command, status } => {
            assert_eq!(command, "bundle install --jobs 4");
            assert_eq!(status, "exit code 5");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(h.log.count(|e| matches!(e, Event::Save { .. })), 0);
    assert!(h.exporter.output("ruby-prefix").is_none());
}

#[test]
fn test_unknown_version_never_installs() {
    let mut h = Harness::new();
    write_ruby_version(&h.project(), "9.9.9");
    let options = h.options("");

    let err = h.run(&options).unwrap_err();

    assert!(matches!(err, SetupError::UnknownVersion { .. }));
    assert!(h.installer.requests().is_empty());
}

#[test]
fn test_missing_version_file_is_reported() {
    let mut h = Harness::new();
    std::fs::create_dir_all(h.project()).unwrap();
    let options = h.options("");

    let err = h.run(&options).unwrap_err();

    assert!(matches!(err, SetupError::ProjectVersionFile(_)));
}

#[test]
fn test_windows_run_exports_runner_variables() {
    let mut h = Harness::new();
    h.facts = h
        .facts
        .clone()
        .platform(Platform::new(OsFamily::Windows, "2022", Arch::X64))
        .var("ImageOS", "win22")
        .var("RUNNER_TEMP", r"D:\a\_temp")
        .var("USERPROFILE", r"C:\Users\runneradmin");
    write_ruby_version(&h.project(), "3.3.6");
    let options = h.options("[bundler]\nversion = \"none\"\n");

    h.run(&options).unwrap();

    assert_eq!(h.exporter.variable("TMPDIR"), Some(r"D:\a\_temp"));
    assert_eq!(h.exporter.variable("HOME"), Some(r"C:\Users\runneradmin"));
    assert_eq!(h.exporter.variable("MSYS2_PATH_TYPE"), Some("inherit"));
}

#[test]
fn test_ruby_entries_removed_from_path() {
    let mut h = Harness::new();
    h.facts = h
        .facts
        .clone()
        .var("PATH", "/opt/hostedtoolcache/Ruby/3.0.0/x64/bin:/usr/bin");
    write_ruby_version(&h.project(), "3.3.6");
    let options = h.options("[bundler]\nversion = \"none\"\n");

    h.run(&options).unwrap();

    assert_eq!(h.exporter.variable("PATH"), Some("/usr/bin"));
}

#[test]
fn test_jruby_keeps_java_home_when_it_starts() {
    let mut h = Harness::new();
    write_ruby_version(&h.project(), "jruby-9.4.8.0");
    let options = h.options("[bundler]\nversion = \"none\"\n");

    h.run(&options).unwrap();

    assert!(h.log.commands().contains(&"ruby --version".to_string()));
    assert_eq!(h.exporter.variable("JAVA_HOME"), None);
}

#[test]
fn test_jruby_switches_to_newer_jdk_when_it_fails_to_start() {
    let mut h = Harness::new();
    h.runner = RecordingRunner::new(&h.log).fail("ruby --version", 1);
    h.facts = h
        .facts
        .clone()
        .var("JAVA_HOME_21_X64", "/usr/lib/jvm/temurin-21-jdk-amd64");
    write_ruby_version(&h.project(), "jruby-9.4.8.0");
    let options = h.options("[bundler]\nversion = \"none\"\n");

    h.run(&options).unwrap();

    assert_eq!(
        h.exporter.variable("JAVA_HOME"),
        Some("/usr/lib/jvm/temurin-21-jdk-amd64")
    );
    let version_check = h.runner.find("ruby --version").unwrap();
    let path = version_check.env.get("PATH").unwrap();
    assert!(path.starts_with(&*h.temp.path().join("rubies/jruby-9.4.8.0/bin").to_string_lossy()));
}

#[test]
fn test_jruby_without_newer_jdk_fails() {
    let mut h = Harness::new();
    h.runner = RecordingRunner::new(&h.log).fail("ruby --version", 1);
    write_ruby_version(&h.project(), "jruby-9.4.8.0");
    let options = h.options("[bundler]\nversion = \"none\"\n");

    let err = h.run(&options).unwrap_err();

    assert!(matches!(err, SetupError::JavaHomeMissing { ref variable, .. } if variable == "JAVA_HOME_21_X64"));
}

#[test]
fn test_cruby_does_not_check_java() {
    let mut h = Harness::new();
    write_ruby_version(&h.project(), "3.3.6");
    let options = h.options("[bundler]\nversion = \"none\"\n");

    h.run(&options).unwrap();

    assert!(h.runner.find("ruby --version").is_none());
    assert_eq!(h.exporter.variable("JAVA_HOME"), None);
}
