//! Advisory file locks for cross-process mutual exclusion
//!
//! Concurrent CI jobs on one self-hosted machine share the tool cache and the
//! local cache backend. These locks serialize writers to the same key.

use std::path::Path;
use std::time::Duration;

mod acquire;
mod error;
mod guard;

pub use error::LockError;
pub use guard::LockGuard;


/// Acquires an exclusive lock on `lock_path`, retrying until `timeout`.
///
/// Retries use exponential backoff. After a couple of seconds of waiting a
/// progress message naming `description` is logged once.
///
/// # Examples
///
/// ```no_run
/// use gemstrap_core::lock::acquire_lock;
/// use std::time::Duration;
/// use std::path::Path;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let guard = acquire_lock(Path::new("/tmp/ruby-3.3.6.lock"), Duration::from_secs(30), "install ruby-3.3.6")?;
/// // Critical section here
/// drop(guard);
/// # Ok(())
/// # }
/// ```
pub fn acquire_lock(
    lock_path: &Path,
    timeout: Duration,
    description: &str,
) -> Result<LockGuard, LockError> {
    acquire::acquire_with_retry(lock_path, timeout, description)
}

/// Attempts to take an exclusive lock without waiting.
///
/// Returns `Ok(None)` when another holder owns the lock.
pub fn try_acquire_lock(lock_path: &Path) -> Result<Option<LockGuard>, LockError> {
    acquire::try_acquire(lock_path)
}
