//! Archive download and extraction
//!
//! - Streaming HTTP downloads into a temporary file
//! - `.tar.gz` extraction with per-entry path validation

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Duration;

use gemstrap_core::SetupError;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use thiserror::Error;
use url::Url;

/// Timeout for runtime archive downloads (5 minutes for large archives)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

pub const USER_AGENT: &str = "gemstrap";

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("404 Not Found: {url}")]
    NotFound { url: Url },

    #[error("Failed to download {url}: {source}")]
    Http {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to extract {archive}: {reason}")]
    Extraction { archive: String, reason: String },

    #[error("I/O error during {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl From<DownloadError> for SetupError {
    fn from(err: DownloadError) -> Self {
        match &err {
            DownloadError::NotFound { url } | DownloadError::Http { url, .. } => {
                SetupError::DownloadFailed {
                    url: url.to_string(),
                    reason: err.to_string(),
                }
            }
            DownloadError::Extraction { .. } | DownloadError::Io { .. } => {
                SetupError::Generic(err.to_string())
            }
        }
    }
}

pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// Downloads `url` into a temporary file in `dir` (the system temp dir when
/// `None`).
///
/// The file is deleted when the returned path is dropped.
pub fn download_to_temp(
    url: &Url,
    dir: Option<&Path>,
) -> Result<tempfile::TempPath, DownloadError> {
    let client = build_client(DEFAULT_TIMEOUT).map_err(|e| DownloadError::Http {
        url: url.clone(),
        source: e,
    })?;

    let mut response = client
        .get(url.as_str())
        .send()
        .map_err(|e| DownloadError::Http {
            url: url.clone(),
            source: e,
        })?;

    if response.status() == StatusCode::NOT_FOUND {
        return Err(DownloadError::NotFound { url: url.clone() });
    }
    if let Err(err) = response.error_for_status_ref() {
        return Err(DownloadError::Http {
            url: url.clone(),
            source: err.without_url(),
        });
    }

    let temp_file = match dir {
        Some(dir) => tempfile::NamedTempFile::new_in(dir),
        None => tempfile::NamedTempFile::new(),
    };
    let mut temp_file = temp_file.map_err(|e| DownloadError::Io {
        operation: "create temporary file for download".to_string(),
        source: e,
    })?;

    let mut buffer = [0; 8192];
    let mut downloaded: u64 = 0;
    loop {
        let bytes_read = response.read(&mut buffer).map_err(|e| DownloadError::Io {
            operation: "read from HTTP response".to_string(),
            source: e,
        })?;
        if bytes_read == 0 {
            break;
        }

        temp_file
            .write_all(&buffer[..bytes_read])
            .map_err(|e| DownloadError::Io {
                operation: "write to temporary file".to_string(),
                source: e,
            })?;
        downloaded += bytes_read as u64;
    }
    tracing::debug!("Downloaded {} bytes from {}", downloaded, url);

    temp_file.as_file().sync_all().map_err(|e| DownloadError::Io {
        operation: "sync temporary file".to_string(),
        source: e,
    })?;

    Ok(temp_file.into_temp_path())
}

/// Extracts a `.tar.gz` archive into `dest_dir`.
///
/// Entries escaping `dest_dir` are rejected by `unpack_in`.
pub fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<(), DownloadError> {
    let archive_name = archive_path.display().to_string();
    let extraction_failed = |e: io::Error| DownloadError::Extraction {
        archive: archive_name.clone(),
        reason: e.to_string(),
    };

    let file = fs::File::open(archive_path).map_err(|e| DownloadError::Io {
        operation: format!("open archive {}", archive_path.display()),
        source: e,
    })?;
    fs::create_dir_all(dest_dir).map_err(|e| DownloadError::Io {
        operation: format!("create directory {}", dest_dir.display()),
        source: e,
    })?;

    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
    archive.set_preserve_permissions(true);
    for entry in archive.entries().map_err(extraction_failed)? {
        let mut entry = entry.map_err(extraction_failed)?;
        entry.unpack_in(dest_dir).map_err(extraction_failed)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use mockito::Server;
    use tempfile::TempDir;

    fn tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (path, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, path, *content).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_download_to_temp_success() {
        let mut server = Server::new();
        let body = vec![b'x'; 1000];
        let mock = server
            .mock("GET", "/ruby-3.3.6-ubuntu-24.04-x64.tar.gz")
            .with_status(200)
            .with_body(&body)
            .create();

        let url = Url::parse(&format!("{}/ruby-3.3.6-ubuntu-24.04-x64.tar.gz", server.url()))
            .unwrap();
        let path = download_to_temp(&url, None).unwrap();

        mock.assert();
        assert_eq!(fs::metadata(&path).unwrap().len(), 1000);
    }

    #[test]
    fn test_download_not_found() {
        let mut server = Server::new();
        let _mock = server.mock("GET", "/missing.tar.gz").with_status(404).create();

        let url = Url::parse(&format!("{}/missing.tar.gz", server.url())).unwrap();
        let err = download_to_temp(&url, None).unwrap_err();
        assert!(matches!(err, DownloadError::NotFound { .. }));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_download_server_error() {
        let mut server = Server::new();
        let _mock = server.mock("GET", "/broken.tar.gz").with_status(500).create();

        let url = Url::parse(&format!("{}/broken.tar.gz", server.url())).unwrap();
        let err = download_to_temp(&url, None).unwrap_err();
        assert!(matches!(err, DownloadError::Http { .. }));
        let setup: SetupError = err.into();
        assert!(setup.to_string().starts_with("DOWNLOAD_FAILED"));
    }

    #[test]
    fn test_extract_tar_gz() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("ruby.tar.gz");
        fs::write(
            &archive,
            tar_gz(&[("ruby-3.3.6/bin/ruby", b"#!/bin/sh\n"), ("ruby-3.3.6/lib/x.rb", b"")]),
        )
        .unwrap();

        let dest = temp.path().join("rubies");
        extract_tar_gz(&archive, &dest).unwrap();
        assert!(dest.join("ruby-3.3.6/bin/ruby").is_file());
        assert!(dest.join("ruby-3.3.6/lib/x.rb").is_file());
    }

    #[test]
    fn test_extract_corrupted_archive() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("bad.tar.gz");
        fs::write(&archive, b"not a gzip stream").unwrap();

        let err = extract_tar_gz(&archive, &temp.path().join("out")).unwrap_err();
        assert!(matches!(err, DownloadError::Extraction { .. }));
    }
}
