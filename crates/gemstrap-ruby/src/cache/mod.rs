//! Dependency cache: keys, backends and the coordinator around `bundle install`

pub mod backend;
pub mod coordinator;
pub mod key;
pub mod local;

pub use backend::{BackendError, BackendOp, CacheBackend, tolerate};
pub use coordinator::{CacheCoordinator, CacheKeys, DependencyInstaller, InstallOutcome};
pub use key::{
    CACHE_KEY_PREFIX, CacheKeyFacts, ScopingFacts, build_base_key, build_full_key, is_exact_match,
    restore_prefix,
};
pub use local::LocalCacheBackend;
