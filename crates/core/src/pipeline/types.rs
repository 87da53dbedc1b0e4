//! Types for the pipeline module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::admission::GateStatus;
use crate::auth::Identity;
use crate::resolver::Metadata;

/// How the result is handed to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Converted to a file that is served afterwards.
    #[default]
    Buffered,
    /// Piped to the caller as it is produced. Nothing touches disk.
    Streamed,
}

impl DeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buffered => "buffered",
            Self::Streamed => "streamed",
        }
    }
}

/// Lifecycle state of a job.
///
/// ```text
/// Requested ─┬─> Rejected
///            └─> Admitted ─┬─> Resolving ──> Transcoding ──> Completed
///                          └─> Streaming ──> StreamEnded
/// Admitted | Resolving | Transcoding | Streaming ──> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Requested,
    Admitted,
    Resolving,
    Transcoding,
    Streaming,
    Completed,
    StreamEnded,
    Rejected,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Admitted => "admitted",
            Self::Resolving => "resolving",
            Self::Transcoding => "transcoding",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::StreamEnded => "stream_ended",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }

    /// Returns true if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::StreamEnded | Self::Rejected | Self::Failed
        )
    }

    /// Whether `self -> next` is an edge of the lifecycle.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Requested, Admitted)
                | (Requested, Rejected)
                | (Admitted, Resolving)
                | (Admitted, Streaming)
                | (Resolving, Transcoding)
                | (Transcoding, Completed)
                | (Admitted | Resolving | Transcoding | Streaming, Failed)
                | (Streaming, StreamEnded)
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attempted a transition that is not an edge of the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid job transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: JobState,
    pub to: JobState,
}

/// One media request, owned by the coordinator for its whole lifetime.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub source_url: String,
    pub mode: DeliveryMode,
    pub state: JobState,
    pub requested_by: Identity,
    /// Working file, buffered mode only.
    pub workspace_path: Option<PathBuf>,
    /// Filled in after the probe.
    pub metadata: Option<Metadata>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(source_url: impl Into<String>, mode: DeliveryMode, requested_by: Identity) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_url: source_url.into(),
            mode,
            state: JobState::Requested,
            requested_by,
            workspace_path: None,
            metadata: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Moves to `next`, stamping `completed_at` on terminal states.
    pub fn transition(&mut self, next: JobState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            source_url: self.source_url.clone(),
            mode: self.mode,
            state: self.state,
            requested_by: self.requested_by.user_id.clone(),
            title: self.metadata.as_ref().map(|m| m.title.clone()),
            error: self.error.clone(),
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }
}

/// A request to run one job.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub source_url: String,
    pub mode: DeliveryMode,
    pub requested_by: Identity,
}

impl SubmitRequest {
    pub fn buffered(source_url: impl Into<String>, requested_by: Identity) -> Self {
        Self {
            source_url: source_url.into(),
            mode: DeliveryMode::Buffered,
            requested_by,
        }
    }

    pub fn streamed(source_url: impl Into<String>, requested_by: Identity) -> Self {
        Self {
            source_url: source_url.into(),
            mode: DeliveryMode::Streamed,
            requested_by,
        }
    }
}

/// A finished, retrievable file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    /// Location on disk.
    pub path: PathBuf,
    /// URL path the file is served under.
    pub public_url: String,
    /// Suggested download name, derived from the title.
    pub file_name: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// Result of a completed buffered job.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub job_id: Uuid,
    pub title: String,
    pub author: String,
    pub artifact: Artifact,
    pub duration_ms: u64,
}

/// Read-only view of a job for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub source_url: String,
    pub mode: DeliveryMode,
    pub state: JobState,
    pub requested_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Counters since startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineTotals {
    pub submitted: u64,
    pub rejected: u64,
    pub completed: u64,
    pub stream_ended: u64,
    pub failed: u64,
    /// Streams closed early by the client.
    pub aborted: u64,
}

/// Overall pipeline status.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub admission: GateStatus,
    pub active_jobs: Vec<JobSnapshot>,
    pub totals: PipelineTotals,
}

/// Builds `{title}.{ext}` with characters that are unsafe in file names replaced.
pub fn display_file_name(title: &str, extension: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('.');
    let stem = if cleaned.is_empty() { "audio" } else { cleaned };
    format!("{}.{}", stem, extension)
}
