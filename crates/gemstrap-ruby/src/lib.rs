//! Ruby runtime setup for CI runners.
//!
//! This crate resolves a requested Ruby version against a catalog of
//! prebuilt releases, installs the runtime, picks compatible RubyGems and
//! Bundler versions, and runs `bundle install` around a dependency cache.
//!
//! # Architecture
//!
//! - [`resolve`]: version specifiers to catalog entries, with hard exclusions
//! - [`policy`]: ordered rule tables for RubyGems and Bundler compatibility
//! - [`install`]: ruby-builder and RubyInstaller downloads, tool cache layout
//! - [`cache`]: cache keys, backends and the restore/install/save coordinator
//! - [`env`]: PATH and variable export for later CI steps
//! - [`orchestrator`]: the full sequence behind `gemstrap setup`
//!
//! # Setup Flow
//!
//! ```text
//! install_runtime()
//!     ↓
//! 1. Read .ruby-version / .tool-versions if requested
//!     ↓
//! 2. Resolve engine + version on this platform
//!     ↓
//! 3. Reuse or install into the tool cache / ~/.rubies
//!     ↓
//! 4. PATH cleanup, Windows variables
//!     ↓
//! 5. RubyGems update, Bundler install
//!     ↓
//! 6. bundle install: restore → install → clean → save
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use gemstrap_ruby::catalog::VersionCatalog;
//! use gemstrap_ruby::resolve::resolve;
//! use gemstrap_core::platform::detect_platform;
//!
//! # fn main() -> gemstrap_core::Result<()> {
//! let catalog = VersionCatalog::embedded()?;
//! let platform = detect_platform(None)?;
//! let resolved = resolve("3.3", &platform, &catalog)?;
//! println!("{}", resolved);
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod cache;
pub mod catalog;
pub mod env;
pub mod facts;
pub mod install;
pub mod measure;
pub mod orchestrator;
pub mod policy;
pub mod resolve;
pub mod runner;
pub mod version;

pub use catalog::VersionCatalog;
pub use orchestrator::{Services, SetupOptions, SetupReport, install_runtime};
pub use resolve::{ResolvedVersion, resolve};
pub use version::Engine;
