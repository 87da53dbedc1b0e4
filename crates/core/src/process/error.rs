//! Error types for the process module.

use thiserror::Error;

/// Errors raised while running an external tool.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The executable could not be found.
    #[error("Executable not found: {program}")]
    NotFound { program: String },

    /// The process could not be started.
    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process exited with a non-zero status.
    #[error("{program} exited with code {exit_code:?}")]
    NonZeroExit {
        program: String,
        exit_code: Option<i32>,
        stderr_excerpt: String,
    },

    /// The process exceeded its runtime ceiling and was killed.
    #[error("{program} timed out after {timeout_secs} seconds")]
    Timeout { program: String, timeout_secs: u64 },

    /// The process was terminated on request.
    #[error("{program} was terminated")]
    Terminated { program: String },

    /// I/O error while talking to the process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessError {
    pub(crate) fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        let program = program.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { program }
        } else {
            Self::SpawnFailed { program, source }
        }
    }

    /// Exit code of the failed process, if it exited on its own.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::NonZeroExit { exit_code, .. } => *exit_code,
            _ => None,
        }
    }

    /// Tail of the tool's stderr, when available.
    pub fn stderr_excerpt(&self) -> Option<&str> {
        match self {
            Self::NonZeroExit { stderr_excerpt, .. } if !stderr_excerpt.is_empty() => {
                Some(stderr_excerpt)
            }
            _ => None,
        }
    }

    /// Whether resubmitting the same work may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NonZeroExit { .. } | Self::Timeout { .. } | Self::Io(_)
        )
    }
}
