//! Input defaults and well-known file names

pub const CONFIG_FILE_NAME: &str = "gemstrap.toml";

pub const DEFAULT_RUBY_INPUT: &str = "default";
pub const DEFAULT_BUNDLER_INPUT: &str = "Gemfile.lock";
pub const DEFAULT_RUBYGEMS_INPUT: &str = "default";

/// Cache namespace token that is omitted from cache keys
pub const DEFAULT_CACHE_VERSION: &str = "0";

/// Project files a runtime version can be read from
pub mod version_files {
    pub const RUBY_VERSION: &str = ".ruby-version";
    pub const TOOL_VERSIONS: &str = ".tool-versions";
}
