pub mod consts;
pub mod model;
pub mod request;

pub use model::{BundlerConfig, CacheConfig, Config, RubyConfig, RubygemsConfig, RunnerConfig};
pub use request::{BundlerRequest, RubygemsRequest, VersionRequest};
