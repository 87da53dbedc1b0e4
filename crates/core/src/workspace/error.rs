//! Error types for the workspace module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while managing job workspaces.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The output directory could not be created.
    #[error("Failed to create directory: {path}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The working file was never produced.
    #[error("Working file not found: {path}")]
    NotFound { path: PathBuf },

    /// Renaming the working file to its final name failed.
    #[error("Failed to promote {source} to {destination}")]
    PromoteFailed {
        source: PathBuf,
        destination: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// A workspace file could not be removed.
    #[error("Failed to remove {path}")]
    DiscardFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkspaceError {
    pub fn promote_failed(source: PathBuf, destination: PathBuf, error: std::io::Error) -> Self {
        Self::PromoteFailed {
            source,
            destination,
            error,
        }
    }
}
