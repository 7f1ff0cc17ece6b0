//! Directory-backed cache for runners without a hosted cache service
//!
//! Each entry is a `<sha256(key)>.tar.gz` payload next to a
//! `<sha256(key)>.json` metadata file recording the original key. Entries are
//! immutable once written.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use gemstrap_core::digest::sha256_hex;
use gemstrap_core::lock::try_acquire_lock;
use serde::{Deserialize, Serialize};

use super::backend::{BackendError, CacheBackend};

/// Longest key the hosted cache service accepts
pub const MAX_KEY_LENGTH: usize = 512;

type BackendResult<T> = std::result::Result<T, BackendError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryMetadata {
    key: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LocalCacheBackend {
    root: PathBuf,
    /// Cached paths are relative to this directory
    base_dir: PathBuf,
}

impl LocalCacheBackend {
    pub fn new(root: impl Into<PathBuf>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            base_dir: base_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_stem(key: &str) -> String {
        sha256_hex(key.as_bytes())
    }

    fn payload_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.tar.gz", Self::entry_stem(key)))
    }

    fn metadata_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", Self::entry_stem(key)))
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.lock", Self::entry_stem(key)))
    }

    fn read_metadata(path: &Path) -> Option<EntryMetadata> {
        let content = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                tracing::debug!("Ignoring unreadable cache metadata {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Newest entry whose key starts with one of `prefixes`; equal
    /// timestamps go to the greater key
    fn newest_matching(&self, prefixes: &[String]) -> BackendResult<Option<EntryMetadata>> {
        if !self.root.is_dir() {
            return Ok(None);
        }

        let mut newest: Option<EntryMetadata> = None;
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(metadata) = Self::read_metadata(&path) else {
                continue;
            };
            if !prefixes.iter().any(|p| metadata.key.starts_with(p.as_str())) {
                continue;
            }
            if newest.as_ref().is_none_or(|current| {
                (metadata.created_at, &metadata.key) > (current.created_at, &current.key)
            }) {
                newest = Some(metadata);
            }
        }
        Ok(newest)
    }

    fn unpack(&self, key: &str) -> BackendResult<()> {
        let file = fs::File::open(self.payload_path(key))?;
        let mut archive = tar::Archive::new(GzDecoder::new(file));
        fs::create_dir_all(&self.base_dir)?;

        for entry in archive.entries()? {
            let mut entry = entry?;
            entry.unpack_in(&self.base_dir)?;
        }
        Ok(())
    }

    fn pack(&self, paths: &[PathBuf], dest: &mut impl Write) -> BackendResult<usize> {
        let encoder = GzEncoder::new(dest, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let mut packed = 0;

        for path in paths {
            let source = self.base_dir.join(path);
            if source.is_dir() {
                builder.append_dir_all(path, &source)?;
            } else if source.is_file() {
                builder.append_path_with_name(&source, path)?;
            } else {
                tracing::warn!("Cache path {} does not exist, skipping", source.display());
                continue;
            }
            packed += 1;
        }

        builder.into_inner()?.finish()?;
        Ok(packed)
    }
}

fn validate_key(key: &str) -> BackendResult<()> {
    if key.len() > MAX_KEY_LENGTH {
        return Err(BackendError::Validation(format!(
            "Key Validation Error: {} cannot be larger than {} characters.",
            key, MAX_KEY_LENGTH
        )));
    }
    if key.contains(',') {
        return Err(BackendError::Validation(format!(
            "Key Validation Error: {} cannot contain commas.",
            key
        )));
    }
    Ok(())
}

fn validate_paths(paths: &[PathBuf]) -> BackendResult<()> {
    if paths.is_empty() {
        return Err(BackendError::Validation(
            "Path Validation Error: At least one directory or file path is required".to_string(),
        ));
    }
    Ok(())
}

impl CacheBackend for LocalCacheBackend {
    fn restore(
        &self,
        paths: &[PathBuf],
        key: &str,
        restore_keys: &[String],
    ) -> BackendResult<Option<String>> {
        validate_paths(paths)?;
        validate_key(key)?;
        for restore_key in restore_keys {
            validate_key(restore_key)?;
        }

        let matched = match Self::read_metadata(&self.metadata_path(key)) {
            Some(exact) => Some(exact),
            None => self.newest_matching(restore_keys)?,
        };

        match matched {
            Some(metadata) => {
                self.unpack(&metadata.key)?;
                tracing::debug!("Restored {} from {}", metadata.key, self.root.display());
                Ok(Some(metadata.key))
            }
            None => Ok(None),
        }
    }

    fn save(&self, paths: &[PathBuf], key: &str) -> BackendResult<()> {
        self.save_at(paths, key, Utc::now())
    }
}

impl LocalCacheBackend {
    fn save_at(&self, paths: &[PathBuf], key: &str, created_at: DateTime<Utc>) -> BackendResult<()> {
        validate_paths(paths)?;
        validate_key(key)?;
        fs::create_dir_all(&self.root)?;

        let reserve_conflict = || {
            BackendError::ReserveConflict(format!(
                "Unable to reserve cache with key {}, another job may be creating this cache.",
                key
            ))
        };
        let _guard = try_acquire_lock(&self.lock_path(key))
            .map_err(|e| BackendError::Other(e.to_string()))?
            .ok_or_else(reserve_conflict)?;
        if self.metadata_path(key).exists() {
            return Err(reserve_conflict());
        }

        let mut payload = tempfile::NamedTempFile::new_in(&self.root)?;
        if self.pack(paths, payload.as_file_mut())? == 0 {
            return Err(BackendError::Other(
                "Path Validation Error: Path(s) specified for caching do not exist, hence no cache is being saved.".to_string(),
            ));
        }
        payload
            .persist(self.payload_path(key))
            .map_err(|e| BackendError::Other(e.error.to_string()))?;

        let metadata = EntryMetadata {
            key: key.to_string(),
            created_at,
        };
        let json = serde_json::to_string_pretty(&metadata)
            .map_err(|e| BackendError::Other(e.to_string()))?;
        let mut metadata_file = tempfile::NamedTempFile::new_in(&self.root)?;
        metadata_file.write_all(json.as_bytes())?;
        metadata_file
            .persist(self.metadata_path(key))
            .map_err(|e| BackendError::Other(e.error.to_string()))?;

        tracing::info!("Cache saved with key: {}", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, LocalCacheBackend, Vec<PathBuf>) {
        let temp = TempDir::new().unwrap();
        let work = temp.path().join("work");
        fs::create_dir_all(work.join("vendor/bundle/ruby/3.3.0/gems/rake-13.2.1")).unwrap();
        fs::write(work.join("vendor/bundle/ruby/3.3.0/gems/rake-13.2.1/rake.rb"), "rake").unwrap();
        let backend = LocalCacheBackend::new(temp.path().join("cache"), &work);
        (temp, backend, vec![PathBuf::from("vendor/bundle")])
    }

    #[test]
    fn test_save_then_restore_exact() {
        let (temp, backend, paths) = setup();
        backend.save(&paths, "base-Gemfile.lock-aaa").unwrap();

        fs::remove_dir_all(temp.path().join("work/vendor")).unwrap();
        let restored = backend
            .restore(&paths, "base-Gemfile.lock-aaa", &["base-Gemfile.lock-".to_string()])
            .unwrap();

        assert_eq!(restored.as_deref(), Some("base-Gemfile.lock-aaa"));
        assert!(temp
            .path()
            .join("work/vendor/bundle/ruby/3.3.0/gems/rake-13.2.1/rake.rb")
            .is_file());
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + seconds, 0).unwrap()
    }

    #[test]
    fn test_restore_falls_back_to_newest_prefix_match() {
        let (_temp, backend, paths) = setup();
        backend.save_at(&paths, "base-Gemfile.lock-bbb", at(0)).unwrap();
        backend.save_at(&paths, "base-Gemfile.lock-aaa", at(60)).unwrap();
        backend.save_at(&paths, "other-Gemfile.lock-ccc", at(120)).unwrap();

        let restored = backend
            .restore(&paths, "base-Gemfile.lock-zzz", &["base-Gemfile.lock-".to_string()])
            .unwrap();
        assert_eq!(restored.as_deref(), Some("base-Gemfile.lock-aaa"));
    }

    #[test]
    fn test_restore_breaks_timestamp_ties_by_key() {
        let (_temp, backend, paths) = setup();
        backend.save_at(&paths, "base-Gemfile.lock-bbb", at(0)).unwrap();
        backend.save_at(&paths, "base-Gemfile.lock-aaa", at(0)).unwrap();

        for _ in 0..3 {
            let restored = backend
                .restore(&paths, "base-Gemfile.lock-zzz", &["base-Gemfile.lock-".to_string()])
                .unwrap();
            assert_eq!(restored.as_deref(), Some("base-Gemfile.lock-bbb"));
        }
    }

    #[test]
    fn test_restore_miss() {
        let (_temp, backend, paths) = setup();
        let restored = backend.restore(&paths, "key", &["prefix-".to_string()]).unwrap();
        assert!(restored.is_none());
    }

    #[test]
    fn test_second_save_is_reserve_conflict() {
        let (_temp, backend, paths) = setup();
        backend.save(&paths, "key").unwrap();
        let err = backend.save(&paths, "key").unwrap_err();
        assert!(matches!(err, BackendError::ReserveConflict(_)));
    }

    #[test]
    fn test_held_lock_is_reserve_conflict() {
        let (_temp, backend, paths) = setup();
        fs::create_dir_all(backend.root()).unwrap();
        let _held = try_acquire_lock(&backend.lock_path("key")).unwrap().unwrap();

        let err = backend.save(&paths, "key").unwrap_err();
        assert!(matches!(err, BackendError::ReserveConflict(_)));
    }

    #[test]
    fn test_key_validation() {
        let (_temp, backend, paths) = setup();
        let long = "k".repeat(MAX_KEY_LENGTH + 1);
        assert!(matches!(
            backend.save(&paths, &long),
            Err(BackendError::Validation(_))
        ));
        assert!(matches!(
            backend.restore(&paths, "a,b", &[]),
            Err(BackendError::Validation(_))
        ));
        assert!(matches!(
            backend.save(&[], "key"),
            Err(BackendError::Validation(_))
        ));
    }

    #[test]
    fn test_save_without_existing_paths() {
        let (_temp, backend, _paths) = setup();
        let err = backend.save(&[PathBuf::from("missing")], "key").unwrap_err();
        assert!(matches!(err, BackendError::Other(_)));
    }
}
