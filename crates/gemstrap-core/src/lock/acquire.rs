//! Polling acquisition with capped exponential backoff

use super::{LockError, LockGuard};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

/// Sleep intervals between attempts: 10ms doubling up to 500ms
struct Backoff {
    next: Duration,
}

impl Backoff {
    const FIRST: Duration = Duration::from_millis(10);
    const CAP: Duration = Duration::from_millis(500);

    fn new() -> Self {
        Self { next: Self::FIRST }
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next;
        self.next = (current * 2).min(Self::CAP);
        Some(current)
    }
}

/// Waiting longer than this is worth telling the user about
const ANNOUNCE_AFTER: Duration = Duration::from_secs(2);

pub(crate) fn acquire_with_retry(
    lock_path: &Path,
    timeout: Duration,
    description: &str,
) -> Result<LockGuard, LockError> {
    let started = Instant::now();
    let mut announced = false;

    for delay in Backoff::new() {
        if let Some(guard) = try_acquire(lock_path)? {
            return Ok(guard);
        }

        let waited = started.elapsed();
        if waited >= timeout {
            break;
        }
        if !announced && waited >= ANNOUNCE_AFTER {
            tracing::info!(
                "Another job holds {}, waiting ({})",
                lock_path.display(),
                description
            );
            announced = true;
        }
        thread::sleep(delay.min(timeout - waited));
    }

    Err(LockError::Timeout {
        path: lock_path.to_path_buf(),
        description: description.to_string(),
    })
}

pub(crate) fn try_acquire(lock_path: &Path) -> Result<Option<LockGuard>, LockError> {
    let file = open_lock_file(lock_path)?;

    match file.try_lock_exclusive() {
        Ok(()) => Ok(Some(LockGuard {
            file,
            path: lock_path.to_path_buf(),
        })),
        Err(e) if is_contended(&e) => Ok(None),
        Err(e) => Err(io_error(lock_path, "locking", e)),
    }
}

/// fs2 reports contention as `WouldBlock` on Unix and as a raw OS error on
/// Windows
fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

fn open_lock_file(lock_path: &Path) -> Result<File, LockError> {
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| io_error(lock_path, "creating the lock directory", e))?;
    }

    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
        .map_err(|e| io_error(lock_path, "opening the lock file", e))
}

fn io_error(path: &Path, operation: &str, source: io::Error) -> LockError {
    LockError::Io {
        source,
        path: path.to_path_buf(),
        operation: operation.to_string(),
    }
}
