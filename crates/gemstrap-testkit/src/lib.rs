//! Test utilities for gemstrap
//!
//! Fakes for the collaborator traits of `gemstrap-ruby`, project fixtures
//! and a shared mock HTTP server.

use tempfile::TempDir;

pub mod fakes;
pub mod fixtures;
pub mod mock;

pub use fakes::{
    Event, EventLog, FakeCacheBackend, FakeDependencyInstaller, FakeFacts, FakeInstaller,
    MemoryExporter, RecordingRunner,
};
pub use mock::{SHARED_MOCK_SERVER, get_shared_mock_server, shared_mock_url};

/// Creates a temporary directory within `.tmp/` under the current directory
///
/// Keeps test trees in one gitignored place that is easy to clean up by
/// hand.
///
/// # Panics
///
/// Panics if the current directory cannot be determined or `.tmp/` cannot
/// be created.
///
/// # Examples
///
/// ```rust
/// use gemstrap_testkit::temp_dir_in_workspace;
///
/// let temp = temp_dir_in_workspace();
/// std::fs::write(temp.path().join("Gemfile"), "source 'https://rubygems.org'").unwrap();
/// ```
pub fn temp_dir_in_workspace() -> TempDir {
    try_temp_dir_in_workspace().expect("Failed to create temporary directory in .tmp/")
}

/// [`temp_dir_in_workspace`] without panicking
pub fn try_temp_dir_in_workspace() -> std::io::Result<TempDir> {
    let workspace_root = std::env::current_dir()?;
    let tmp_base = workspace_root.join(".tmp");
    std::fs::create_dir_all(&tmp_base)?;
    TempDir::new_in(&tmp_base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_dir_in_workspace_location() {
        let temp = temp_dir_in_workspace();
        let parent = temp.path().parent().unwrap();
        assert_eq!(parent.file_name().unwrap(), ".tmp");
        assert!(temp.path().is_dir());
    }

    #[test]
    fn test_temp_dir_cleanup() {
        let path = {
            let temp = temp_dir_in_workspace();
            temp.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
