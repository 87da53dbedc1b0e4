//! In-memory registry of in-flight jobs.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};
use uuid::Uuid;

use super::types::{Job, JobSnapshot, JobState, PipelineTotals};
use crate::resolver::Metadata;

/// Tracks admitted jobs until they reach a terminal state.
#[derive(Default)]
pub(crate) struct JobRegistry {
    active: RwLock<HashMap<Uuid, Job>>,
    totals: Totals,
}

#[derive(Default)]
struct Totals {
    submitted: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
    stream_ended: AtomicU64,
    failed: AtomicU64,
    aborted: AtomicU64,
}

impl JobRegistry {
    pub fn record_submitted(&self) {
        self.totals.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.totals.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Starts tracking an admitted job.
    pub fn insert(&self, job: Job) {
        self.active.write().insert(job.id, job);
    }

    /// Applies a non-terminal transition. Returns false if the job is unknown
    /// or the edge is invalid.
    pub fn transition(&self, id: Uuid, next: JobState) -> bool {
        let mut active = self.active.write();
        let Some(job) = active.get_mut(&id) else {
            warn!(job_id = %id, state = %next, "Transition for unknown job");
            return false;
        };
        match job.transition(next) {
            Ok(()) => {
                debug!(job_id = %id, state = %next, "Job state changed");
                true
            }
            Err(e) => {
                warn!(job_id = %id, error = %e, "Rejected job transition");
                false
            }
        }
    }

    pub fn set_metadata(&self, id: Uuid, metadata: Metadata) {
        if let Some(job) = self.active.write().get_mut(&id) {
            job.metadata = Some(metadata);
        }
    }

    pub fn set_workspace(&self, id: Uuid, path: std::path::PathBuf) {
        if let Some(job) = self.active.write().get_mut(&id) {
            job.workspace_path = Some(path);
        }
    }

    /// Moves a job into a terminal state and stops tracking it.
    ///
    /// `aborted` marks a failed stream that the client closed early; it is
    /// counted separately from real failures.
    pub fn finish(&self, id: Uuid, state: JobState, error: Option<String>, aborted: bool) -> Option<Job> {
        let mut job = self.active.write().remove(&id)?;
        if let Err(e) = job.transition(state) {
            warn!(job_id = %id, error = %e, "Rejected terminal transition");
        }
        job.error = error;

        let counter = match (job.state, aborted) {
            (JobState::Completed, _) => &self.totals.completed,
            (JobState::StreamEnded, _) => &self.totals.stream_ended,
            (_, true) => &self.totals.aborted,
            _ => &self.totals.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Some(job)
    }

    pub fn get(&self, id: Uuid) -> Option<JobSnapshot> {
        self.active.read().get(&id).map(Job::snapshot)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.active.read().len()
    }

    /// Active jobs, oldest first.
    pub fn snapshots(&self) -> Vec<JobSnapshot> {
        let mut jobs: Vec<JobSnapshot> = self.active.read().values().map(Job::snapshot).collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    pub fn totals(&self) -> PipelineTotals {
        let t = &self.totals;
        PipelineTotals {
            submitted: t.submitted.load(Ordering::Relaxed),
            rejected: t.rejected.load(Ordering::Relaxed),
            completed: t.completed.load(Ordering::Relaxed),
            stream_ended: t.stream_ended.load(Ordering::Relaxed),
            failed: t.failed.load(Ordering::Relaxed),
            aborted: t.aborted.load(Ordering::Relaxed),
        }
    }
}
