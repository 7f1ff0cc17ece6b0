//! Cache key construction
//!
//! Field order is part of the key format: entries are found by exact key
//! and by prefix, so reordering fields orphans every existing entry.

use serde::Serialize;

use crate::version::Engine;

/// Literal prefix of every key; bump the suffix to invalidate all entries
pub const CACHE_KEY_PREFIX: &str = "gemstrap-bundler-cache-v6";

/// Cache namespace token that is not written into keys
pub const DEFAULT_CACHE_VERSION: &str = gemstrap_core::config::consts::DEFAULT_CACHE_VERSION;

/// Process configuration that changes what `bundle install` produces
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScopingFacts {
    pub working_directory: String,
    /// `$BUNDLE_WITH`
    pub bundle_with: String,
    /// `$BUNDLE_WITHOUT`
    pub bundle_without: String,
    /// `$BUNDLE_ONLY`
    pub bundle_only: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheKeyFacts {
    /// e.g. `ubuntu-24.04-x64`
    pub platform_id: String,
    pub engine: Engine,
    pub version: String,
    pub scoping: ScopingFacts,
    pub cache_version: String,
    /// `RbConfig::CONFIG['ruby_version']` of head builds
    pub abi: Option<String>,
    /// Lockfile name relative to the working directory
    pub lockfile: String,
}

/// Whether a build is unstable enough that its ABI must be part of the key.
///
/// JRuby head keeps a stable ABI across revisions.
pub fn needs_abi(engine: Engine, version: &str) -> bool {
    crate::version::is_head_version(version) && engine != Engine::JRuby
}

pub fn build_base_key(facts: &CacheKeyFacts) -> String {
    let scoping = &facts.scoping;
    let mut key = format!(
        "{}-{}-{}-{}-wd-{}-with-{}-without-{}-only-{}",
        CACHE_KEY_PREFIX,
        facts.platform_id,
        facts.engine,
        facts.version,
        scoping.working_directory,
        scoping.bundle_with,
        scoping.bundle_without,
        scoping.bundle_only
    );

    if facts.cache_version != DEFAULT_CACHE_VERSION {
        key.push_str("-v-");
        key.push_str(&facts.cache_version);
    }

    if let Some(abi) = &facts.abi {
        key.push_str("-ABI-");
        key.push_str(abi);
    }

    key.push('-');
    key.push_str(&facts.lockfile);
    key
}

/// `lock_digest` is the hex SHA-256 of the lockfile bytes
pub fn build_full_key(base_key: &str, lock_digest: &str) -> String {
    format!("{}-{}", base_key, lock_digest)
}

pub fn restore_prefix(base_key: &str) -> String {
    format!("{}-", base_key)
}

/// Backends may report keys with different casing than they were saved with.
pub fn is_exact_match(full_key: &str, matched: Option<&str>) -> bool {
    matched.is_some_and(|matched| matched.eq_ignore_ascii_case(full_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemstrap_core::digest::sha256_hex;

    fn facts() -> CacheKeyFacts {
        CacheKeyFacts {
            platform_id: "ubuntu-24.04-x64".to_string(),
            engine: Engine::Ruby,
            version: "3.3.6".to_string(),
            scoping: ScopingFacts {
                working_directory: "/home/runner/work/app/app".to_string(),
                bundle_with: String::new(),
                bundle_without: "development".to_string(),
                bundle_only: String::new(),
            },
            cache_version: DEFAULT_CACHE_VERSION.to_string(),
            abi: None,
            lockfile: "Gemfile.lock".to_string(),
        }
    }

    #[test]
    fn test_base_key_field_order() {
        assert_eq!(
            build_base_key(&facts()),
            "gemstrap-bundler-cache-v6-ubuntu-24.04-x64-ruby-3.3.6-wd-/home/runner/work/app/app-with--without-development-only--Gemfile.lock"
        );
    }

    #[test]
    fn test_cache_version_and_abi_are_appended() {
        let mut facts = facts();
        facts.version = "head".to_string();
        facts.cache_version = "2".to_string();
        facts.abi = Some("3.5.0+1".to_string());

        let key = build_base_key(&facts);
        assert!(key.ends_with("-only--v-2-ABI-3.5.0+1-Gemfile.lock"));
    }

    #[test]
    fn test_needs_abi() {
        assert!(needs_abi(Engine::Ruby, "head"));
        assert!(needs_abi(Engine::TruffleRuby, "head"));
        assert!(!needs_abi(Engine::JRuby, "head"));
        assert!(!needs_abi(Engine::Ruby, "3.3.6"));
    }

    #[test]
    fn test_full_key_is_deterministic() {
        let lock = b"GEM\n  specs:\n    rake (13.2.1)\n";
        let first = build_full_key(&build_base_key(&facts()), &sha256_hex(lock));
        let second = build_full_key(&build_base_key(&facts()), &sha256_hex(lock));
        assert_eq!(first, second);
    }

    #[test]
    fn test_one_lock_byte_changes_only_the_digest() {
        let base = build_base_key(&facts());
        let first = build_full_key(&base, &sha256_hex(b"rake (13.2.1)"));
        let second = build_full_key(&base, &sha256_hex(b"rake (13.2.0)"));

        assert_ne!(first, second);
        let prefix = restore_prefix(&base);
        assert!(first.starts_with(&prefix) && second.starts_with(&prefix));
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn test_restore_prefix_is_strict_prefix() {
        let base = build_base_key(&facts());
        let prefix = restore_prefix(&base);
        for digest in ["0".to_string(), sha256_hex(b"")] {
            let full = build_full_key(&base, &digest);
            assert!(full.starts_with(&prefix));
            assert!(prefix.len() < full.len());
        }
    }

    #[test]
    fn test_exact_match_ignores_case() {
        assert!(is_exact_match("key-abc", Some("KEY-ABC")));
        assert!(!is_exact_match("key-abc", Some("key-abd")));
        assert!(!is_exact_match("key-abc", None));
    }
}
