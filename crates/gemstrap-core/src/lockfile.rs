//! Gemfile detection and lockfile inspection

use std::path::{Path, PathBuf};

use crate::error::{Result, SetupError};

/// A dependency manifest and its lockfile.
///
/// The manifest is guaranteed to exist; the lockfile might not yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gemfiles {
    pub gemfile: PathBuf,
    pub lockfile: PathBuf,
}

impl Gemfiles {
    /// Whether the lockfile exists under `dir`, the directory the
    /// manifest was detected in
    pub fn lockfile_exists(&self, dir: &Path) -> bool {
        dir.join(&self.lockfile).is_file()
    }

    /// Lockfile name as it appears in cache keys
    pub fn lockfile_name(&self) -> String {
        self.lockfile.to_string_lossy().into_owned()
    }
}

/// Finds the project's Gemfile.
///
/// `bundle_gemfile` is the value of `$BUNDLE_GEMFILE`; when set, it must point
/// at an existing file. Relative paths are resolved against `dir` but kept
/// relative in the result, so cache keys do not depend on the checkout path
/// twice.
pub fn detect_gemfiles(dir: &Path, bundle_gemfile: Option<&str>) -> Result<Option<Gemfiles>> {
    let gemfile = bundle_gemfile.unwrap_or("Gemfile");
    if dir.join(gemfile).is_file() {
        return Ok(Some(Gemfiles {
            gemfile: PathBuf::from(gemfile),
            lockfile: PathBuf::from(format!("{}.lock", gemfile)),
        }));
    } else if let Some(path) = bundle_gemfile {
        return Err(SetupError::GemfileMissing {
            path: PathBuf::from(path),
        });
    }

    if dir.join("gems.rb").is_file() {
        return Ok(Some(Gemfiles {
            gemfile: PathBuf::from("gems.rb"),
            lockfile: PathBuf::from("gems.locked"),
        }));
    }

    Ok(None)
}

/// Same acceptance rule Bundler's own version parsing starts from: a leading
/// digit, and not a development build.
pub fn is_valid_bundler_version(version: &str) -> bool {
    version.starts_with(|c: char| c.is_ascii_digit()) && !version.ends_with(".dev")
}

/// Extracts the version following the `BUNDLED WITH` marker line.
pub fn read_bundled_with(contents: &str) -> Option<String> {
    let lines: Vec<&str> = contents.lines().collect();
    let marker = lines.iter().position(|line| line.trim() == "BUNDLED WITH")?;
    let next = lines.get(marker + 1)?.trim();
    if next.is_empty() {
        return None;
    }

    if is_valid_bundler_version(next) {
        Some(next.to_string())
    } else {
        tracing::info!(
            "Could not parse BUNDLED WITH version as a valid Bundler release, ignoring it: {}",
            next
        );
        None
    }
}

/// Reads the pinned Bundler version from a lockfile, if the lockfile exists.
pub fn read_pinned_bundler(lockfile: &Path) -> Result<Option<String>> {
    if !lockfile.is_file() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(lockfile)?;
    let pinned = read_bundled_with(&contents);
    if let Some(version) = &pinned {
        tracing::info!(
            "Using Bundler {} from {} BUNDLED WITH {}",
            version,
            lockfile.display(),
            version
        );
    }
    Ok(pinned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const LOCKFILE: &str = "GEM\n  remote: https://rubygems.org/\n  specs:\n    rake (13.2.1)\n\nPLATFORMS\n  ruby\n\nDEPENDENCIES\n  rake\n\nBUNDLED WITH\n   2.5.22\n";

    #[test]
    fn test_detect_default_gemfile() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Gemfile"), "source 'https://rubygems.org'\n").unwrap();

        let gemfiles = detect_gemfiles(dir.path(), None).unwrap().unwrap();
        assert_eq!(gemfiles.gemfile, PathBuf::from("Gemfile"));
        assert_eq!(gemfiles.lockfile, PathBuf::from("Gemfile.lock"));
    }

    #[test]
    fn test_detect_gems_rb() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("gems.rb"), "").unwrap();

        let gemfiles = detect_gemfiles(dir.path(), None).unwrap().unwrap();
        assert_eq!(gemfiles.lockfile, PathBuf::from("gems.locked"));
    }

    #[test]
    fn test_detect_none() {
        let dir = TempDir::new().unwrap();
        assert!(detect_gemfiles(dir.path(), None).unwrap().is_none());
    }

    #[test]
    fn test_bundle_gemfile_must_exist() {
        let dir = TempDir::new().unwrap();
        let err = detect_gemfiles(dir.path(), Some("gemfiles/rails7.gemfile")).unwrap_err();
        assert!(matches!(err, SetupError::GemfileMissing { .. }));
    }

    #[test]
    fn test_bundle_gemfile_lockfile_name() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("gemfiles")).unwrap();
        fs::write(dir.path().join("gemfiles/rails7.gemfile"), "").unwrap();

        let gemfiles = detect_gemfiles(dir.path(), Some("gemfiles/rails7.gemfile"))
            .unwrap()
            .unwrap();
        assert_eq!(gemfiles.lockfile_name(), "gemfiles/rails7.gemfile.lock");
    }

    #[test]
    fn test_read_bundled_with() {
        assert_eq!(read_bundled_with(LOCKFILE), Some("2.5.22".to_string()));
    }

    #[test]
    fn test_read_bundled_with_crlf() {
        let contents = LOCKFILE.replace('\n', "\r\n");
        assert_eq!(read_bundled_with(&contents), Some("2.5.22".to_string()));
    }

    #[test]
    fn test_read_bundled_with_ignores_dev_versions() {
        let contents = "BUNDLED WITH\n   2.6.0.dev\n";
        assert_eq!(read_bundled_with(contents), None);
    }

    #[test]
    fn test_read_bundled_with_missing_marker() {
        assert_eq!(read_bundled_with("GEM\n  specs:\n"), None);
        assert_eq!(read_bundled_with("BUNDLED WITH\n"), None);
    }

    #[test]
    fn test_read_pinned_bundler_without_lockfile() {
        let dir = TempDir::new().unwrap();
        let pinned = read_pinned_bundler(&dir.path().join("Gemfile.lock")).unwrap();
        assert!(pinned.is_none());
    }
}
