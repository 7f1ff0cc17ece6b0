//! Mock server infrastructure for download tests
//!
//! One mockito server is shared by every test in a binary. Tests keep their
//! mocks apart by using unique paths.

use lazy_static::lazy_static;
use mockito::{Server, ServerGuard};
use std::sync::Mutex;

lazy_static! {
    /// Global shared mockito server, started on first access
    pub static ref SHARED_MOCK_SERVER: Mutex<ServerGuard> = Mutex::new(Server::new());
}

/// Locks the shared mock server.
///
/// Hold the guard only while creating mocks, not for the whole test, or
/// tests serialize on it.
///
/// # Examples
///
/// ```no_run
/// use gemstrap_testkit::get_shared_mock_server;
///
/// let (base_url, _mock) = {
///     let mut server = get_shared_mock_server();
///     let mock = server
///         .mock("GET", "/download/ruby-3.3.6/ruby-3.3.6-ubuntu-24.04-x64.tar.gz")
///         .with_status(200)
///         .create();
///     (server.url(), mock)
/// };
/// ```
pub fn get_shared_mock_server() -> std::sync::MutexGuard<'static, ServerGuard> {
    // A test that panicked with the lock held leaves the server usable
    SHARED_MOCK_SERVER
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Base URL of the shared mock server
pub fn shared_mock_url() -> String {
    get_shared_mock_server().url()
}
