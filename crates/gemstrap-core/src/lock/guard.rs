//! RAII lock guard

use std::fs::File;
use std::path::{Path, PathBuf};

/// Holds an advisory lock until dropped.
///
/// fs2 locks are released when the file descriptor closes, so dropping the
/// guard (including during unwinding) releases the lock.
#[derive(Debug)]
pub struct LockGuard {
    #[allow(dead_code)]
    pub(crate) file: File,
    pub(crate) path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}
