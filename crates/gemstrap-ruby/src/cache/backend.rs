//! Cache backend abstraction and the single place backend failures are
//! classified

use std::path::PathBuf;

use gemstrap_core::{Result, SetupError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The key or paths were rejected; retrying cannot help
    #[error("{0}")]
    Validation(String),

    /// Another run already owns the key
    #[error("{0}")]
    ReserveConflict(String),

    #[error("{0}")]
    Other(String),
}

impl From<BackendError> for SetupError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Validation(msg) => SetupError::CacheValidation(msg),
            BackendError::ReserveConflict(msg) => SetupError::CacheReserveConflict(msg),
            BackendError::Other(msg) => SetupError::CacheBackendTransient(msg),
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::Other(err.to_string())
    }
}

/// Key-addressed storage for directory trees.
pub trait CacheBackend {
    /// Restores `paths` from `key`, or else from the newest entry whose key
    /// starts with one of `restore_keys`. Returns the key that was restored.
    fn restore(
        &self,
        paths: &[PathBuf],
        key: &str,
        restore_keys: &[String],
    ) -> std::result::Result<Option<String>, BackendError>;

    fn save(&self, paths: &[PathBuf], key: &str) -> std::result::Result<(), BackendError>;
}

/// Which backend call a result came from; only changes the log wording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOp {
    Restore,
    Save,
}

/// Maps a backend result onto the run's error policy.
///
/// Validation errors abort the run. A reserve conflict is reported and a
/// transient failure is warned about; both degrade to `Ok(None)`.
pub fn tolerate<T>(op: BackendOp, result: std::result::Result<T, BackendError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(BackendError::Validation(msg)) => Err(SetupError::CacheValidation(msg)),
        Err(BackendError::ReserveConflict(msg)) => {
            tracing::info!("{}", msg);
            Ok(None)
        }
        Err(BackendError::Other(msg)) => {
            match op {
                BackendOp::Restore => {
                    tracing::warn!("There was an error restoring the cache: {}", msg)
                }
                BackendOp::Save => tracing::warn!("There was an error saving the cache: {}", msg),
            }
            Ok(None)
        }
    }
}
