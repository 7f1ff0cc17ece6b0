//! Host platform facts
//!
//! A [`Platform`] is detected once at startup and passed down explicitly.
//! Its [`Platform::id`] namespaces cache keys and must stay stable for the
//! duration of a run.

use std::fmt;
use std::process::Command;

use crate::error::{Result, SetupError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Ubuntu,
    MacOS,
    Windows,
}

impl OsFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Ubuntu => "ubuntu",
            OsFamily::MacOS => "macos",
            OsFamily::Windows => "windows",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X64,
    Arm64,
}

impl Arch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X64 => "x64",
            Arch::Arm64 => "arm64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: OsFamily,
    pub os_version: String,
    pub arch: Arch,
}

impl Platform {
    pub fn new(os: OsFamily, os_version: impl Into<String>, arch: Arch) -> Self {
        Self {
            os,
            os_version: os_version.into(),
            arch,
        }
    }

    /// Runner image name, e.g. `ubuntu-24.04`, `macos-14`, `windows-2022`
    pub fn name(&self) -> String {
        format!("{}-{}", self.os.as_str(), self.os_version)
    }

    /// Name plus architecture, e.g. `ubuntu-24.04-x64`
    pub fn id(&self) -> String {
        format!("{}-{}", self.name(), self.arch)
    }

    /// Platform suffix of prebuilt ruby-builder archives
    pub fn builder_platform(&self) -> String {
        match self.os {
            OsFamily::Ubuntu => self.id(),
            OsFamily::MacOS => format!("darwin-{}", self.arch),
            OsFamily::Windows => format!("windows-{}", self.arch),
        }
    }

    pub fn is_windows(&self) -> bool {
        self.os == OsFamily::Windows
    }

    pub fn is_macos(&self) -> bool {
        self.os == OsFamily::MacOS
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

pub fn detect_arch() -> Result<Arch> {
    #[cfg(target_arch = "x86_64")]
    return Ok(Arch::X64);

    #[cfg(target_arch = "aarch64")]
    return Ok(Arch::Arm64);

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    Err(SetupError::PlatformDetection(format!(
        "Unsupported architecture: {}",
        std::env::consts::ARCH
    )))
}

/// Detects the host platform.
///
/// `image_os` is the runner's `$ImageOS` (e.g. `ubuntu24`, `macos14`,
/// `win22`) and takes precedence over probing the system.
pub fn detect_platform(image_os: Option<&str>) -> Result<Platform> {
    let arch = detect_arch()?;

    if let Some((os, version)) = image_os.and_then(parse_image_os) {
        return Ok(Platform::new(os, version, arch));
    }

    #[cfg(target_os = "linux")]
    {
        let version = std::fs::read_to_string("/etc/lsb-release")
            .ok()
            .and_then(|content| parse_lsb_release(&content))
            .or_else(|| {
                std::fs::read_to_string("/etc/os-release")
                    .ok()
                    .and_then(|content| parse_os_release(&content))
            })
            .ok_or_else(|| {
                SetupError::PlatformDetection("Could not find Ubuntu version".to_string())
            })?;
        Ok(Platform::new(OsFamily::Ubuntu, version, arch))
    }

    #[cfg(target_os = "macos")]
    {
        let output = Command::new("sw_vers")
            .arg("-productVersion")
            .output()
            .map_err(|e| SetupError::PlatformDetection(format!("sw_vers failed: {}", e)))?;
        let version = String::from_utf8_lossy(&output.stdout);
        let major = version.trim().split('.').next().unwrap_or_default();
        if major.is_empty() {
            return Err(SetupError::PlatformDetection(
                "Could not find macOS version".to_string(),
            ));
        }
        Ok(Platform::new(OsFamily::MacOS, major, arch))
    }

    #[cfg(target_os = "windows")]
    {
        let _ = Command::new;
        Ok(Platform::new(OsFamily::Windows, "latest", arch))
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        let _ = Command::new;
        Err(SetupError::PlatformDetection(format!(
            "Unknown platform {}",
            std::env::consts::OS
        )))
    }
}

/// `DISTRIB_RELEASE=24.04` → `24.04`
pub fn parse_lsb_release(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let value = line.trim().strip_prefix("DISTRIB_RELEASE=")?;
        is_major_minor(value).then(|| value.to_string())
    })
}

/// `VERSION_ID="24.04"` → `24.04`
pub fn parse_os_release(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let value = line.trim().strip_prefix("VERSION_ID=")?.trim_matches('"');
        is_major_minor(value).then(|| value.to_string())
    })
}

/// `ubuntu24` → (Ubuntu, `24.04`), `macos14` → (MacOS, `14`), `win22` → (Windows, `2022`)
pub fn parse_image_os(image_os: &str) -> Option<(OsFamily, String)> {
    let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());

    if let Some(v) = image_os.strip_prefix("ubuntu") {
        digits(v).then(|| (OsFamily::Ubuntu, format!("{}.04", v)))
    } else if let Some(v) = image_os.strip_prefix("macos") {
        digits(v).then(|| (OsFamily::MacOS, v.to_string()))
    } else if let Some(v) = image_os.strip_prefix("win") {
        digits(v).then(|| (OsFamily::Windows, format!("20{}", v)))
    } else {
        None
    }
}

fn is_major_minor(value: &str) -> bool {
    let mut parts = value.split('.');
    let major = parts.next().unwrap_or_default();
    let minor = parts.next().unwrap_or_default();
    parts.next().is_none()
        && !major.is_empty()
        && !minor.is_empty()
        && major.chars().chain(minor.chars()).all(|c| c.is_ascii_digit())
}
