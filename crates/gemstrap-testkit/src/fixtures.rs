//! Project trees and archives for tests
//!
//! Everything here panics on I/O failure; these helpers only run in tests.

use std::fs;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;

pub const GEMFILE: &str = "source \"https://rubygems.org\"\n\ngem \"rake\"\n";

/// A minimal lockfile, optionally with a `BUNDLED WITH` section
pub fn lockfile_contents(bundled_with: Option<&str>) -> String {
    let mut contents = String::from(
        "GEM\n  remote: https://rubygems.org/\n  specs:\n    rake (13.2.1)\n\n\
         PLATFORMS\n  ruby\n\nDEPENDENCIES\n  rake\n",
    );
    if let Some(version) = bundled_with {
        contents.push_str(&format!("\nBUNDLED WITH\n   {}\n", version));
    }
    contents
}

pub fn write_gemfile(dir: &Path) {
    fs::create_dir_all(dir).expect("Failed to create project directory");
    fs::write(dir.join("Gemfile"), GEMFILE).expect("Failed to write Gemfile");
}

pub fn write_lockfile(dir: &Path, bundled_with: Option<&str>) {
    fs::create_dir_all(dir).expect("Failed to create project directory");
    fs::write(dir.join("Gemfile.lock"), lockfile_contents(bundled_with))
        .expect("Failed to write Gemfile.lock");
}

pub fn write_ruby_version(dir: &Path, version: &str) {
    fs::create_dir_all(dir).expect("Failed to create project directory");
    fs::write(dir.join(".ruby-version"), format!("{}\n", version))
        .expect("Failed to write .ruby-version");
}

/// Gzipped tarball of `(path, contents)` file entries
pub fn tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (path, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, path, *contents)
            .expect("Failed to append tar entry");
    }

    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .expect("Failed to finish tar.gz")
}

/// What ruby-builder publishes: a single `<name>/` tree with `bin/ruby`
pub fn ruby_build_archive(name: &str) -> Vec<u8> {
    let ruby = format!("{}/bin/ruby", name);
    let gem = format!("{}/bin/gem", name);
    tar_gz(&[
        (ruby.as_str(), b"#!/bin/sh\necho ruby\n"),
        (gem.as_str(), b"#!/bin/sh\necho 3.5.22\n"),
    ])
}
