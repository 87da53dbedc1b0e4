//! Error types for the pipeline module.

use serde::Serialize;
use thiserror::Error;

use crate::process::ProcessError;
use crate::resolver::ResolveError;
use crate::transcode::TranscodeError;
use crate::workspace::WorkspaceError;

/// Errors surfaced by the pipeline coordinator.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Every admission slot is taken.
    #[error("Server is busy ({capacity} jobs in progress), try again later")]
    Busy { capacity: usize },

    /// Malformed input, rejected before admission.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The metadata probe failed.
    #[error("{0}")]
    Resolution(#[from] ResolveError),

    /// The extractor or transcoder failed.
    #[error("External tool failed: {0}")]
    ExternalTool(#[from] ProcessError),

    /// Workspace allocation, promotion or cleanup failed.
    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    /// The client went away mid-stream.
    #[error("Stream aborted by client")]
    StreamAborted,

    /// Unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// How a caller should react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Capacity is exhausted; the same request may succeed later.
    TryLater,
    /// The request cannot succeed as submitted.
    Rejected,
    /// An external failure that may go away on resubmission.
    Transient,
    /// A fault on our side.
    Internal,
}

impl PipelineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Busy { .. } => ErrorClass::TryLater,
            Self::Validation(_) | Self::StreamAborted => ErrorClass::Rejected,
            Self::Resolution(ResolveError::Tool(e)) | Self::ExternalTool(e) => match e {
                // A missing or unrunnable tool is a deployment fault.
                ProcessError::NotFound { .. } | ProcessError::SpawnFailed { .. } => {
                    ErrorClass::Internal
                }
                _ => ErrorClass::Transient,
            },
            Self::Workspace(_) | Self::Internal(_) => ErrorClass::Internal,
        }
    }

    /// Tail of the failing tool's stderr, if any.
    pub fn tool_detail(&self) -> Option<&str> {
        match self {
            Self::ExternalTool(e) | Self::Resolution(ResolveError::Tool(e)) => e.stderr_excerpt(),
            _ => None,
        }
    }

    /// Short machine-readable name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Busy { .. } => "busy",
            Self::Validation(_) => "validation",
            Self::Resolution(_) => "resolution",
            Self::ExternalTool(_) => "external_tool",
            Self::Workspace(_) => "workspace",
            Self::StreamAborted => "stream_aborted",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<TranscodeError> for PipelineError {
    fn from(err: TranscodeError) -> Self {
        match err {
            TranscodeError::Tool(e) => Self::ExternalTool(e),
            TranscodeError::OutputMissing { path } => {
                Self::Workspace(WorkspaceError::NotFound { path })
            }
            TranscodeError::Io(e) => Self::Workspace(WorkspaceError::Io(e)),
        }
    }
}
