use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    // Resolution errors
    #[error("UNKNOWN_ENGINE: unknown engine {engine} on {platform}")]
    UnknownEngine { engine: String, platform: String },

    #[error(
        "UNKNOWN_VERSION: unknown version {version} for {engine} on {platform}\n        available versions for {engine} on {platform}: {}",
        available.join(", ")
    )]
    UnknownVersion {
        engine: String,
        version: String,
        platform: String,
        available: Vec<String>,
    },

    #[error("UNSUPPORTED_COMBINATION: {reason}\n        {remediation}")]
    UnsupportedCombination { reason: String, remediation: String },

    #[error("MALFORMED_AUX_VERSION: cannot parse {tool} input: {input}")]
    MalformedAuxVersionInput { tool: String, input: String },

    #[error("PROJECT_VERSION_FILE: {0}")]
    ProjectVersionFile(String),

    #[error("VERSION_PARSE_ERROR: could not convert version {0} to a float")]
    VersionParse(String),

    // Cache errors
    #[error("CACHE_VALIDATION_ERROR: {0}")]
    CacheValidation(String),

    #[error("CACHE_RESERVE_CONFLICT: {0}")]
    CacheReserveConflict(String),

    #[error("CACHE_BACKEND_ERROR: {0}")]
    CacheBackendTransient(String),

    // Install errors
    #[error("INSTALL_STEP_FAILED: '{command}' exited with {status}")]
    InstallStepFailure { command: String, status: String },

    #[error("GEMFILE_MISSING: $BUNDLE_GEMFILE is set to {path} but does not exist")]
    GemfileMissing { path: PathBuf },

    #[error(
        "UNAVAILABLE_BUILD: unavailable version {version} for {engine} on {platform}\n        You can request it at https://github.com/ruby/setup-ruby/issues\n        Cause: {cause}"
    )]
    UnavailableBuild {
        engine: String,
        version: String,
        platform: String,
        cause: String,
    },

    #[error("DOWNLOAD_FAILED: {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("SELF_HOSTED_RUNTIME_MISSING: {0}")]
    SelfHostedRuntimeMissing(String),

    #[error(
        "JAVA_HOME_MISSING: JAVA_HOME is not Java {major}+ needed for JRuby and ${variable} is not defined"
    )]
    JavaHomeMissing { variable: String, major: u32 },

    // Environment errors
    #[error("PLATFORM_DETECTION_FAILED: {0}")]
    PlatformDetection(String),

    // Config errors
    #[error("CONFIG_PARSE_ERROR: {0}")]
    ConfigParse(String),

    #[error("CONFIG_INVALID_VALUE: {field}: {reason}")]
    ConfigInvalidValue { field: String, reason: String },

    #[error("LOCK_ERROR: {0}")]
    Lock(#[from] crate::lock::LockError),

    // IO errors
    #[error("IO_ERROR: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("{0}")]
    Generic(String),
}

impl SetupError {
    /// Whether this error aborts the run.
    ///
    /// Reserve conflicts and transient backend failures are reported and the
    /// run continues on the cache-miss path.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SetupError::CacheReserveConflict(_) | SetupError::CacheBackendTransient(_)
        )
    }
}

impl From<serde_json::Error> for SetupError {
    fn from(err: serde_json::Error) -> Self {
        SetupError::Generic(format!("JSON error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, SetupError>;
