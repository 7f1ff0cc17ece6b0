use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LockError {
    #[error("timed out waiting for {} ({description})", path.display())]
    Timeout { path: PathBuf, description: String },

    #[error("{operation} failed for {}: {source}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
        operation: String,
    },
}
