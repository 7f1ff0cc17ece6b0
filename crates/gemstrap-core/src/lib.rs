// Core modules
pub mod config;
pub mod digest;
pub mod error;
pub mod lock;
pub mod lockfile;
pub mod platform;
pub mod project;

// Re-export commonly used types
pub use error::{Result, SetupError};
pub use platform::{Arch, OsFamily, Platform};
