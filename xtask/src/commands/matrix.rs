//! CI test matrix: every runner against a sample of catalogued versions

use crate::commands::catalog::BuilderVersions;
use gemstrap_ruby::catalog::WindowsRelease;
use serde::Serialize;

pub const RUNNERS: &[&str] = &[
    "macos-14",
    "macos-15",
    "macos-15-intel",
    "ubuntu-22.04",
    "ubuntu-24.04",
    "ubuntu-22.04-arm",
    "ubuntu-24.04-arm",
    "windows-2022",
    "windows-2025",
    "windows-11-arm",
];

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct MatrixEntry {
    pub os: String,
    pub ruby: String,
}

/// Numeric components of a release, `None` for previews and head builds.
///
/// Patch-level suffixes (`1.9.3-p551`) count as releases.
fn release_segments(version: &str) -> Option<Vec<&str>> {
    let numeric = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    let main = match version.split_once("-p") {
        Some((main, patch)) if numeric(patch) => main,
        _ => version,
    };
    let segments: Vec<&str> = main.split('.').collect();
    segments.iter().all(|s| numeric(*s)).then_some(segments)
}

/// Distinct releases truncated to `segment_count` components, in catalog
/// order, followed by the listed symbolic versions that exist.
pub fn unique_versions(versions: &[String], segment_count: usize, symbolic: &[&str]) -> Vec<String> {
    let mut unique: Vec<String> = Vec::new();
    for version in versions {
        let Some(segments) = release_segments(version) else {
            continue;
        };
        let truncated = segments[..segment_count.min(segments.len())].join(".");
        if !unique.contains(&truncated) {
            unique.push(truncated);
        }
    }
    unique.extend(
        versions
            .iter()
            .filter(|v| symbolic.contains(&v.as_str()))
            .cloned(),
    );
    unique
}

fn product(runners: &[&str], versions: &[String]) -> Vec<MatrixEntry> {
    runners
        .iter()
        .flat_map(|os| {
            versions.iter().map(move |ruby| MatrixEntry {
                os: os.to_string(),
                ruby: ruby.clone(),
            })
        })
        .collect()
}

/// Removes every `runners` × `versions` pair
fn exclude(matrix: &mut Vec<MatrixEntry>, runners: &[&str], versions: &[&str]) {
    matrix.retain(|entry| {
        !(runners.contains(&entry.os.as_str()) && versions.contains(&entry.ruby.as_str()))
    });
}

pub fn build_matrix(builder: &BuilderVersions, windows: &[WindowsRelease]) -> Vec<MatrixEntry> {
    let select = |pred: fn(&str) -> bool| -> Vec<&'static str> {
        RUNNERS.iter().copied().filter(|r| pred(*r)).collect()
    };
    let windows_runners = select(|r| r.starts_with("windows-"));
    let non_windows_runners = select(|r| !r.starts_with("windows-"));
    let macos_arm64_runners = select(|r| r.starts_with("macos-") && !r.ends_with("-intel"));
    let ubuntu_runners = select(|r| r.starts_with("ubuntu-"));
    let ubuntu_arm64_runners = select(|r| r.starts_with("ubuntu-") && r.ends_with("-arm"));
    let ubuntu_x64_runners = select(|r| r.starts_with("ubuntu-") && !r.ends_with("-arm"));
    let windows_arm64_runners = select(|r| r.starts_with("windows-") && r.ends_with("-arm"));
    let windows_x64_runners = select(|r| r.starts_with("windows-") && !r.ends_with("-arm"));

    let engine_versions = |engine: &str| builder.get(engine).cloned().unwrap_or_default();

    // ruby: each minor release + head
    let ruby_versions = unique_versions(&engine_versions("ruby"), 2, &["head"]);
    let windows_versions: Vec<String> = windows.iter().map(|r| r.version.clone()).collect();
    let windows_ruby_versions = unique_versions(&windows_versions, 2, &["head"]);
    let mut matrix = product(&non_windows_runners, &ruby_versions);
    matrix.extend(product(&windows_runners, &windows_ruby_versions));

    // jruby: each major release + head
    let jruby_versions: Vec<String> = unique_versions(&engine_versions("jruby"), 1, &["head"])
        .into_iter()
        .map(|v| format!("jruby-{v}"))
        .collect();
    matrix.extend(product(RUNNERS, &jruby_versions));

    // truffleruby: latest release + head
    let truffleruby_versions = [
        "truffleruby",
        "truffleruby-head",
        "truffleruby+graalvm",
        "truffleruby+graalvm-head",
    ]
    .map(String::from);
    matrix.extend(product(&non_windows_runners, &truffleruby_versions));

    // Windows head builds
    matrix.extend(product(
        &windows_x64_runners,
        &["mingw", "mswin", "ucrt"].map(String::from),
    ));

    let mut newest_ubuntu_x64 = ubuntu_x64_runners.clone();
    newest_ubuntu_x64.sort();
    if let Some(&runner) = newest_ubuntu_x64.last() {
        matrix.extend(product(&[runner], &["asan-release", "asan"].map(String::from)));
    }

    // Known failures
    let modern_ubuntu: Vec<&str> = ubuntu_runners
        .iter()
        .copied()
        .filter(|r| *r != "ubuntu-22.04")
        .collect();
    exclude(&mut matrix, &modern_ubuntu, &["1.9"]);
    exclude(&mut matrix, &ubuntu_runners, &["2.2"]);
    exclude(
        &mut matrix,
        &macos_arm64_runners,
        &["1.9", "2.0", "2.1", "2.2", "2.3", "2.4", "2.5"],
    );
    exclude(&mut matrix, &ubuntu_arm64_runners, &["1.9", "2.0", "2.1", "2.2"]);
    exclude(
        &mut matrix,
        &windows_arm64_runners,
        &["2.0", "2.1", "2.2", "2.3", "2.4", "2.5", "2.6", "2.7", "3.0", "3.1", "3.2", "3.3"],
    );

    matrix.sort();
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(versions: &[&str]) -> Vec<String> {
        versions.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_unique_minor_versions() {
        let versions = strings(&[
            "1.9.3-p551",
            "2.2.10",
            "3.3.0-preview1",
            "3.3.0",
            "3.3.6",
            "3.4.1",
            "head",
            "debug",
        ]);
        assert_eq!(
            unique_versions(&versions, 2, &["head"]),
            strings(&["1.9", "2.2", "3.3", "3.4", "head"])
        );
    }

    #[test]
    fn test_unique_major_versions() {
        let versions = strings(&["9.3.15.0", "9.4.8.0", "10.0.2.0", "head"]);
        assert_eq!(
            unique_versions(&versions, 1, &["head"]),
            strings(&["9", "10", "head"])
        );
    }

    #[test]
    fn test_matrix_exclusions() {
        let mut builder = BuilderVersions::new();
        builder.insert("ruby".to_string(), strings(&["1.9.3", "2.2.10", "3.4.1", "head"]));
        builder.insert("jruby".to_string(), strings(&["9.4.8.0", "head"]));
        let windows = vec![WindowsRelease {
            version: "3.3.6".to_string(),
            x64: Some("https://example.com/ruby-3.3.6-x64.7z".to_string()),
            arm64: None,
        }];

        let matrix = build_matrix(&builder, &windows);
        let has = |os: &str, ruby: &str| {
            matrix.contains(&MatrixEntry {
                os: os.to_string(),
                ruby: ruby.to_string(),
            })
        };

        assert!(has("ubuntu-22.04", "1.9"));
        assert!(!has("ubuntu-24.04", "1.9"));
        assert!(!has("ubuntu-22.04", "2.2"));
        assert!(has("macos-15-intel", "2.2"));
        assert!(!has("macos-14", "2.2"));
        assert!(has("windows-2022", "3.3"));
        assert!(!has("windows-11-arm", "3.3"));
        assert!(has("windows-11-arm", "jruby-9"));
        assert!(!has("windows-2022", "truffleruby"));
        assert!(has("windows-2025", "ucrt"));
        assert!(!has("windows-11-arm", "ucrt"));
        assert!(has("ubuntu-24.04", "asan"));
        assert!(!has("ubuntu-22.04", "asan"));

        let mut sorted = matrix.clone();
        sorted.sort();
        assert_eq!(matrix, sorted);
    }
}
