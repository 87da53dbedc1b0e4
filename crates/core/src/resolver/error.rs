//! Error types for the resolver module.

use thiserror::Error;

use crate::process::ProcessError;

/// Errors raised while resolving source metadata.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The extractor could not be run or exited non-zero.
    #[error("Metadata probe failed: {0}")]
    Tool(#[from] ProcessError),
}

impl ResolveError {
    /// Whether a later probe of the same source may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Tool(e) => e.is_retryable(),
        }
    }
}
