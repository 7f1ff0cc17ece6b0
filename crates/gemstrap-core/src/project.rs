//! Reading the requested runtime version from project files

use std::path::Path;

use crate::config::VersionRequest;
use crate::config::consts::version_files;
use crate::error::{Result, SetupError};

/// Dereferences a [`VersionRequest`] into the raw specifier handed to the
/// resolver.
pub fn read_version_request(request: &VersionRequest, dir: &Path) -> Result<String> {
    match request {
        VersionRequest::Literal(spec) => Ok(spec.clone()),
        VersionRequest::RubyVersionFile => read_ruby_version(dir),
        VersionRequest::ToolVersionsFile => read_tool_versions(dir),
        VersionRequest::ProjectDefault => {
            if dir.join(version_files::RUBY_VERSION).is_file() {
                read_ruby_version(dir)
            } else if dir.join(version_files::TOOL_VERSIONS).is_file() {
                read_tool_versions(dir)
            } else {
                Err(SetupError::ProjectVersionFile(format!(
                    "input ruby-version needs to be specified if no {} or {} file is provided",
                    version_files::RUBY_VERSION,
                    version_files::TOOL_VERSIONS
                )))
            }
        }
    }
}

fn read_ruby_version(dir: &Path) -> Result<String> {
    let path = dir.join(version_files::RUBY_VERSION);
    let content = std::fs::read_to_string(&path).map_err(|e| {
        SetupError::ProjectVersionFile(format!("{}: {}", path.display(), e))
    })?;
    let version = content.trim();
    if version.is_empty() {
        return Err(SetupError::ProjectVersionFile(format!(
            "{} is empty",
            path.display()
        )));
    }
    tracing::info!("Using {} as input from file {}", version, path.display());
    Ok(version.to_string())
}

fn read_tool_versions(dir: &Path) -> Result<String> {
    let path = dir.join(version_files::TOOL_VERSIONS);
    let content = std::fs::read_to_string(&path).map_err(|e| {
        SetupError::ProjectVersionFile(format!("{}: {}", path.display(), e))
    })?;
    let version = parse_tool_versions(&content).ok_or_else(|| {
        SetupError::ProjectVersionFile(format!("no ruby entry in {}", path.display()))
    })?;
    tracing::info!("Using {} as input from file {}", version, path.display());
    Ok(version)
}

/// Finds the `ruby <version>` line of an asdf `.tool-versions` file.
///
/// Only the first listed version is used; asdf treats the rest as fallbacks.
pub fn parse_tool_versions(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let line = line.split('#').next().unwrap_or_default();
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some("ruby"), Some(version)) => Some(version.to_string()),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_literal_passes_through() {
        let dir = TempDir::new().unwrap();
        let request = VersionRequest::Literal("3.3".to_string());
        assert_eq!(read_version_request(&request, dir.path()).unwrap(), "3.3");
    }

    #[test]
    fn test_default_prefers_ruby_version() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".ruby-version"), "3.2.4\n").unwrap();
        fs::write(dir.path().join(".tool-versions"), "ruby 3.1.6\n").unwrap();

        let version = read_version_request(&VersionRequest::ProjectDefault, dir.path()).unwrap();
        assert_eq!(version, "3.2.4");
    }

    #[test]
    fn test_default_falls_back_to_tool_versions() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(".tool-versions"),
            "nodejs 20.11.0\nruby 3.1.6 system\n",
        )
        .unwrap();

        let version = read_version_request(&VersionRequest::ProjectDefault, dir.path()).unwrap();
        assert_eq!(version, "3.1.6");
    }

    #[test]
    fn test_default_without_files_fails() {
        let dir = TempDir::new().unwrap();
        let err = read_version_request(&VersionRequest::ProjectDefault, dir.path()).unwrap_err();
        assert!(matches!(err, SetupError::ProjectVersionFile(_)));
    }

    #[test]
    fn test_tool_versions_without_ruby_line() {
        assert_eq!(parse_tool_versions("nodejs 20\n# ruby 3.3\n"), None);
        assert_eq!(parse_tool_versions("ruby   jruby-9.4.8.0\n"), Some("jruby-9.4.8.0".into()));
    }

    #[test]
    fn test_empty_ruby_version_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".ruby-version"), "  \n").unwrap();
        assert!(read_version_request(&VersionRequest::RubyVersionFile, dir.path()).is_err());
    }
}
