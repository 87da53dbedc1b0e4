//! Pipeline coordinator implementation.
//!
//! Drives one job through admission, probe, transcode and delivery:
//! - Buffered: Resolving -> Transcoding -> Completed, on a detached task so an
//!   abandoned caller cannot interrupt it halfway.
//! - Streamed: a single Streaming stage handed to the caller as a [`DeliveryStream`].

use chrono::{Datelike, Utc};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::PipelineConfig;
use super::delivery::DeliveryStream;
use super::error::PipelineError;
use super::registry::JobRegistry;
use super::types::{
    display_file_name, Artifact, DeliveryMode, Job, JobResult, JobSnapshot, JobState,
    PipelineStatus, SubmitRequest,
};
use super::validator::SourceValidator;
use crate::admission::{AdmissionGate, AdmissionToken};
use crate::auth::Identity;
use crate::metrics::{ADMISSION_REJECTIONS, JOBS_FINISHED, JOBS_SUBMITTED, JOB_DURATION};
use crate::process::ToolsConfig;
use crate::resolver::{Metadata, MetadataResolver, SizeEstimate, YtDlpResolver, UNKNOWN};
use crate::transcode::{TagSet, Transcoder, YtDlpTranscoder};
use crate::workspace::{WorkspaceHandle, WorkspaceManager};

/// What a successful submission hands back.
#[derive(Debug)]
pub enum JobOutcome {
    /// Buffered job finished; the artifact is on disk.
    Completed(JobResult),
    /// Streamed job started; the caller drains the stream.
    Streaming(DeliveryStream),
}

/// Ties the admission gate, resolver, transcoder and workspace into one job lifecycle.
///
/// Cheap to clone; clones share the gate and the job registry.
#[derive(Clone)]
pub struct PipelineCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    config: PipelineConfig,
    validator: SourceValidator,
    gate: Arc<AdmissionGate>,
    workspace: WorkspaceManager,
    resolver: Arc<dyn MetadataResolver>,
    transcoder: Arc<dyn Transcoder>,
    registry: Arc<JobRegistry>,
}

impl PipelineCoordinator {
    /// Creates a coordinator around an existing gate and tool implementations.
    pub fn new(
        config: PipelineConfig,
        gate: Arc<AdmissionGate>,
        resolver: Arc<dyn MetadataResolver>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Result<Self, PipelineError> {
        let validator = SourceValidator::new(&config.source_pattern)
            .map_err(|e| PipelineError::Internal(format!("invalid source_pattern: {}", e)))?;

        Ok(Self {
            inner: Arc::new(Inner {
                workspace: WorkspaceManager::new(&config.output_dir),
                config,
                validator,
                gate,
                resolver,
                transcoder,
                registry: Arc::new(JobRegistry::default()),
            }),
        })
    }

    /// Creates a coordinator backed by yt-dlp and ffmpeg.
    pub fn with_tools(config: PipelineConfig, tools: &ToolsConfig) -> Result<Self, PipelineError> {
        let gate = Arc::new(AdmissionGate::new(config.max_concurrent_jobs));
        let resolver = Arc::new(YtDlpResolver::new(tools, config.audio_format));
        let transcoder = Arc::new(YtDlpTranscoder::new(
            tools,
            config.audio_format,
            config.audio_quality.clone(),
        ));
        Self::new(config, gate, resolver, transcoder)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    pub fn gate(&self) -> &Arc<AdmissionGate> {
        &self.inner.gate
    }

    pub fn transcoder(&self) -> &Arc<dyn Transcoder> {
        &self.inner.transcoder
    }

    /// Runs a job in the requested delivery mode.
    pub async fn submit(&self, request: SubmitRequest) -> Result<JobOutcome, PipelineError> {
        match request.mode {
            DeliveryMode::Buffered => self
                .submit_buffered(&request.source_url, request.requested_by)
                .await
                .map(JobOutcome::Completed),
            DeliveryMode::Streamed => self
                .submit_streamed(&request.source_url, request.requested_by)
                .map(JobOutcome::Streaming),
        }
    }

    /// Probes, converts and promotes one source to a file.
    ///
    /// The work runs on its own task and finishes even if this future is dropped.
    pub async fn submit_buffered(
        &self,
        source_url: &str,
        requested_by: Identity,
    ) -> Result<JobResult, PipelineError> {
        let url = self.inner.validator.validate(source_url)?.to_string();
        let (job_id, token) = self.admit(&url, DeliveryMode::Buffered, requested_by)?;

        let this = self.clone();
        tokio::spawn(async move { this.run_buffered(job_id, url, token).await })
            .await
            .map_err(|e| PipelineError::Internal(format!("job task failed: {}", e)))?
    }

    /// Starts a streamed job. The admission slot is held until the returned
    /// stream ends or is dropped.
    pub fn submit_streamed(
        &self,
        source_url: &str,
        requested_by: Identity,
    ) -> Result<DeliveryStream, PipelineError> {
        let url = self.inner.validator.validate(source_url)?;
        let (job_id, token) = self.admit(url, DeliveryMode::Streamed, requested_by)?;
        let registry = &self.inner.registry;
        registry.transition(job_id, JobState::Streaming);

        let format = self.inner.transcoder.format();
        match self
            .inner
            .transcoder
            .stream(url, self.inner.config.stream_buffer_chunks)
        {
            Ok(stream) => {
                debug!(job_id = %job_id, "Streaming started");
                Ok(DeliveryStream::new(
                    job_id,
                    format.stream_mime_type(),
                    stream,
                    token,
                    Arc::clone(registry),
                ))
            }
            Err(e) => {
                let err = PipelineError::from(e);
                warn!(job_id = %job_id, error = %err, "Failed to start stream");
                registry.finish(job_id, JobState::Failed, Some(err.to_string()), false);
                token.release();
                record_outcome(DeliveryMode::Streamed, "failed", Duration::ZERO);
                Err(err)
            }
        }
    }

    /// Full metadata probe. Does not use an admission slot.
    pub async fn probe(&self, source_url: &str) -> Result<Metadata, PipelineError> {
        let url = self.inner.validator.validate(source_url)?;
        Ok(self.inner.resolver.probe(url).await?)
    }

    /// Estimated converted size. Does not use an admission slot.
    pub async fn probe_size(&self, source_url: &str) -> Result<SizeEstimate, PipelineError> {
        let url = self.inner.validator.validate(source_url)?;
        Ok(self.inner.resolver.probe_size(url).await?)
    }

    /// Gate occupancy, active jobs and totals.
    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            admission: self.inner.gate.status(),
            active_jobs: self.inner.registry.snapshots(),
            totals: self.inner.registry.totals(),
        }
    }

    /// Snapshot of an in-flight job.
    pub fn job(&self, job_id: Uuid) -> Option<JobSnapshot> {
        self.inner.registry.get(job_id)
    }

    /// Requested -> Admitted, or Requested -> Rejected when the gate is full.
    fn admit(
        &self,
        url: &str,
        mode: DeliveryMode,
        requested_by: Identity,
    ) -> Result<(Uuid, AdmissionToken), PipelineError> {
        let registry = &self.inner.registry;
        registry.record_submitted();
        JOBS_SUBMITTED.with_label_values(&[mode.as_str()]).inc();

        let mut job = Job::new(url, mode, requested_by);

        let Some(token) = self.inner.gate.try_admit() else {
            let capacity = self.inner.gate.capacity();
            let _ = job.transition(JobState::Rejected);
            registry.record_rejected();
            ADMISSION_REJECTIONS.inc();
            JOBS_FINISHED
                .with_label_values(&[mode.as_str(), "rejected"])
                .inc();
            info!(job_id = %job.id, mode = mode.as_str(), capacity, "Job rejected, pipeline at capacity");
            return Err(PipelineError::Busy { capacity });
        };

        job.transition(JobState::Admitted)
            .map_err(|e| PipelineError::Internal(e.to_string()))?;
        let job_id = job.id;
        info!(
            job_id = %job_id,
            mode = mode.as_str(),
            user = %job.requested_by.user_id,
            url = %url,
            "Job admitted"
        );
        registry.insert(job);

        Ok((job_id, token))
    }

    async fn run_buffered(
        &self,
        job_id: Uuid,
        url: String,
        token: AdmissionToken,
    ) -> Result<JobResult, PipelineError> {
        let started = Instant::now();
        let result = self.execute_buffered(job_id, &url, started).await;
        let registry = &self.inner.registry;

        match &result {
            Ok(done) => {
                registry.finish(job_id, JobState::Completed, None, false);
                record_outcome(DeliveryMode::Buffered, "completed", started.elapsed());
                info!(
                    job_id = %job_id,
                    title = %done.title,
                    size_bytes = done.artifact.size_bytes,
                    duration_ms = done.duration_ms,
                    "Job completed"
                );
            }
            Err(e) => {
                registry.finish(job_id, JobState::Failed, Some(e.to_string()), false);
                record_outcome(DeliveryMode::Buffered, "failed", started.elapsed());
                warn!(job_id = %job_id, error = %e, detail = ?e.tool_detail(), "Job failed");
            }
        }

        token.release();
        result
    }

    async fn execute_buffered(
        &self,
        job_id: Uuid,
        url: &str,
        started: Instant,
    ) -> Result<JobResult, PipelineError> {
        let inner = &self.inner;
        let format = inner.transcoder.format();

        inner.registry.transition(job_id, JobState::Resolving);
        let metadata = inner.resolver.probe(url).await?;
        inner.registry.set_metadata(job_id, metadata.clone());

        let handle = inner.workspace.allocate(job_id, format.extension()).await?;
        inner
            .registry
            .set_workspace(job_id, handle.working_path().to_path_buf());
        inner.registry.transition(job_id, JobState::Transcoding);

        if let Err(e) = self.produce(url, &handle, &metadata).await {
            self.discard(handle).await;
            return Err(e);
        }

        let final_path = inner.workspace.promote(handle).await?;
        let size_bytes = match tokio::fs::metadata(&final_path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Failed to stat artifact");
                0
            }
        };
        let stored_name = file_name_of(&final_path);

        Ok(JobResult {
            job_id,
            artifact: Artifact {
                public_url: inner.config.public_url(&stored_name),
                file_name: display_file_name(&metadata.title, format.extension()),
                path: final_path,
                size_bytes,
                created_at: Utc::now(),
            },
            title: metadata.title,
            author: metadata.author,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Materializes into the working path, then tags it if enabled.
    async fn produce(
        &self,
        url: &str,
        handle: &WorkspaceHandle,
        metadata: &Metadata,
    ) -> Result<(), PipelineError> {
        let inner = &self.inner;
        inner
            .transcoder
            .materialize(url, handle.working_path())
            .await?;

        if inner.config.embed_tags {
            let tags = self.tags_for(metadata);
            // Tags are cosmetic; a failure here must not fail the job.
            if let Err(e) = inner.transcoder.tag(handle.working_path(), &tags).await {
                warn!(job_id = %handle.job_id(), error = %e, "Failed to write tags, keeping untagged file");
            }
        }
        Ok(())
    }

    fn tags_for(&self, metadata: &Metadata) -> TagSet {
        let known = |value: &str| (value != UNKNOWN).then(|| value.to_string());
        TagSet {
            title: known(&metadata.title),
            artist: known(&metadata.author),
            album: Some(self.inner.config.tag_album.clone()).filter(|a| !a.is_empty()),
            year: Some(Utc::now().year()),
        }
    }

    async fn discard(&self, handle: WorkspaceHandle) {
        let job_id = handle.job_id();
        if let Err(e) = self.inner.workspace.discard(handle).await {
            warn!(job_id = %job_id, error = %e, "Failed to discard workspace");
        }
    }
}

pub(crate) fn record_outcome(mode: DeliveryMode, result: &str, elapsed: Duration) {
    JOBS_FINISHED
        .with_label_values(&[mode.as_str(), result])
        .inc();
    JOB_DURATION
        .with_label_values(&[mode.as_str(), result])
        .observe(elapsed.as_secs_f64());
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockResolver, MockTranscoder};
    use tempfile::TempDir;

    fn coordinator(dir: &Path, capacity: usize) -> (PipelineCoordinator, Arc<MockTranscoder>) {
        let config = PipelineConfig {
            max_concurrent_jobs: capacity,
            output_dir: dir.to_path_buf(),
            ..Default::default()
        };
        let transcoder = Arc::new(MockTranscoder::new());
        let coordinator = PipelineCoordinator::new(
            config,
            Arc::new(AdmissionGate::new(capacity)),
            Arc::new(MockResolver::new()),
            transcoder.clone(),
        )
        .unwrap();
        (coordinator, transcoder)
    }

    #[tokio::test]
    async fn test_validation_happens_before_admission() {
        let temp = TempDir::new().unwrap();
        let (coordinator, _) = coordinator(temp.path(), 1);

        let err = coordinator
            .submit_buffered("https://example.com/video", Identity::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));

        let status = coordinator.status();
        assert_eq!(status.admission.occupancy, 0);
        assert_eq!(status.totals.submitted, 0);
    }

    #[tokio::test]
    async fn test_buffered_job_completes() {
        let temp = TempDir::new().unwrap();
        let (coordinator, transcoder) = coordinator(temp.path(), 1);

        let result = coordinator
            .submit_buffered("https://youtu.be/abc", Identity::anonymous())
            .await
            .unwrap();

        assert_eq!(result.title, "Mock Title");
        assert_eq!(result.artifact.file_name, "Mock Title.mp3");
        assert_eq!(
            result.artifact.public_url,
            format!("/downloads/{}.mp3", result.job_id)
        );
        assert!(result.artifact.path.exists());
        assert!(result.artifact.size_bytes > 0);
        assert_eq!(transcoder.tagged().len(), 1);

        let status = coordinator.status();
        assert_eq!(status.admission.occupancy, 0);
        assert!(status.active_jobs.is_empty());
        assert_eq!(status.totals.completed, 1);
    }

    #[tokio::test]
    async fn test_zero_capacity_rejects() {
        let temp = TempDir::new().unwrap();
        let (coordinator, _) = coordinator(temp.path(), 0);

        let err = coordinator
            .submit(SubmitRequest::streamed("https://youtu.be/abc", Identity::anonymous()))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Busy { capacity: 0 }));
        assert_eq!(coordinator.status().totals.rejected, 1);
    }

    #[test]
    fn test_invalid_pattern_rejected_at_construction() {
        let config = PipelineConfig {
            source_pattern: "(".to_string(),
            ..Default::default()
        };
        let result = PipelineCoordinator::new(
            config,
            Arc::new(AdmissionGate::new(1)),
            Arc::new(MockResolver::new()),
            Arc::new(MockTranscoder::new()),
        );
        assert!(matches!(result, Err(PipelineError::Internal(_))));
    }

    #[test]
    fn test_tags_skip_unknown_fields() {
        let temp = TempDir::new().unwrap();
        let (coordinator, _) = coordinator(temp.path(), 1);
        let tags = coordinator.tags_for(&Metadata::unknown());
        assert_eq!(tags.title, None);
        assert_eq!(tags.artist, None);
        assert_eq!(tags.album.as_deref(), Some("YouTube"));
        assert!(tags.year.is_some());
    }
}
