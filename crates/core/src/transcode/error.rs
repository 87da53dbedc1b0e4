//! Error types for the transcode module.

use std::path::PathBuf;
use thiserror::Error;

use crate::process::ProcessError;

/// Errors raised while producing audio.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// An external tool failed.
    #[error("{0}")]
    Tool(#[from] ProcessError),

    /// The tools reported success but the expected file is not there.
    #[error("Output file not produced: {path}")]
    OutputMissing { path: PathBuf },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscodeError {
    /// Whether resubmitting the same source may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Tool(e) => e.is_retryable(),
            Self::OutputMissing { .. } => false,
            Self::Io(_) => true,
        }
    }
}
