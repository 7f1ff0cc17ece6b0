#[cfg(test)]
mod tests {
    use escargot::CargoBuild;
    use gemstrap_testkit::temp_dir_in_workspace;
    use predicates::prelude::*;
    use std::fs;
    use std::path::Path;
    use std::sync::LazyLock;

    static XTASK: LazyLock<escargot::CargoRun> = LazyLock::new(|| {
        CargoBuild::new()
            .bin("xtask")
            .run()
            .expect("failed to build xtask")
    });

    const BUILDER: &str = r#"{
  "jruby": [
    "9.4.8.0",
    "head"
  ],
  "ruby": [
    "3.3.6",
    "3.4.1",
    "head",
    "debug"
  ]
}
"#;

    const WINDOWS: &str = r#"[
  {
    "version": "3.3.6",
    "x64": "https://example.com/rubyinstaller-3.3.6-1-x64.7z"
  }
]
"#;

    fn write_catalog(dir: &Path, builder: &str) {
        fs::write(dir.join("ruby-builder-versions.json"), builder).unwrap();
        fs::write(dir.join("windows-versions.json"), WINDOWS).unwrap();
    }

    fn catalog(dir: &Path, args: &[&str]) -> std::process::Output {
        XTASK
            .command()
            .arg("catalog")
            .arg("--data-dir")
            .arg(dir)
            .args(args)
            .output()
            .unwrap()
    }

    #[test]
    fn test_help() {
        let output = XTASK.command().arg("--help").output().unwrap();

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("Version catalog maintenance"));
    }

    #[test]
    fn test_catalog_help() {
        let output = XTASK
            .command()
            .arg("catalog")
            .arg("--help")
            .output()
            .unwrap();

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("Add released versions"));
        assert!(stdout.contains("Print the CI test matrix as JSON"));
    }

    #[test]
    fn test_add_version_keeps_head_builds_last() {
        let temp = temp_dir_in_workspace();
        write_catalog(temp.path(), BUILDER);

        let output = catalog(temp.path(), &["add-version", "ruby-3.4.2, jruby-10.0.2.0"]);
        assert!(
            output.status.success(),
            "{}",
            String::from_utf8_lossy(&output.stderr)
        );

        let content = fs::read_to_string(temp.path().join("ruby-builder-versions.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(
            value["ruby"],
            serde_json::json!(["3.3.6", "3.4.1", "3.4.2", "head", "debug"])
        );
        assert_eq!(
            value["jruby"],
            serde_json::json!(["9.4.8.0", "10.0.2.0", "head"])
        );
        assert!(content.ends_with("]\n}\n"));
    }

    #[test]
    fn test_add_version_rejects_non_release() {
        let temp = temp_dir_in_workspace();
        write_catalog(temp.path(), BUILDER);

        let output = catalog(temp.path(), &["add-version", "ruby-3.4"]);
        assert!(!output.status.success());

        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(predicate::str::contains("not a release version").eval(&stderr));
        let content = fs::read_to_string(temp.path().join("ruby-builder-versions.json")).unwrap();
        assert_eq!(content, BUILDER);
    }

    #[test]
    fn test_verify_accepts_shipped_catalog() {
        let data_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../crates/gemstrap-ruby/data");
        let output = catalog(&data_dir, &["verify"]);

        assert!(
            output.status.success(),
            "{}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    #[test]
    fn test_verify_rejects_duplicates() {
        let temp = temp_dir_in_workspace();
        write_catalog(
            temp.path(),
            r#"{"ruby": ["3.3.6", "3.3.6", "head"]}"#,
        );

        let output = catalog(temp.path(), &["verify"]);
        assert!(!output.status.success());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("duplicate version 3.3.6"));
    }

    #[test]
    fn test_verify_rejects_release_after_head() {
        let temp = temp_dir_in_workspace();
        write_catalog(temp.path(), r#"{"ruby": ["3.3.6", "head", "3.4.1"]}"#);

        let output = catalog(temp.path(), &["verify"]);
        assert!(!output.status.success());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("ruby-3.4.1"));
    }

    #[test]
    fn test_matrix_prints_json() {
        let temp = temp_dir_in_workspace();
        write_catalog(temp.path(), BUILDER);

        let output = catalog(temp.path(), &["matrix"]);
        assert!(output.status.success());

        let matrix: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
        assert!(matrix.contains(&serde_json::json!({"os": "ubuntu-24.04", "ruby": "3.4"})));
        assert!(matrix.contains(&serde_json::json!({"os": "windows-2022", "ruby": "3.3"})));
        assert!(matrix.contains(&serde_json::json!({"os": "macos-14", "ruby": "jruby-head"})));
    }
}
