//! Live delivery of a streamed job.

use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use super::coordinator::record_outcome;
use super::error::PipelineError;
use super::registry::JobRegistry;
use super::types::{DeliveryMode, JobState};
use crate::admission::AdmissionToken;
use crate::metrics::STREAMED_BYTES;
use crate::process::{ByteStream, StreamCompletion};

/// Audio bytes of a streamed job, in order, as the encoder produces them.
///
/// Owns the job's admission slot. The job ends when the stream is exhausted,
/// yields an error, or is dropped; dropping it early kills the external
/// processes and records a client abort. After an early drop the slot stays
/// occupied until the producer has reaped its processes.
pub struct DeliveryStream {
    job_id: Uuid,
    content_type: &'static str,
    inner: ByteStream,
    completion: Option<StreamCompletion>,
    token: Option<AdmissionToken>,
    registry: Arc<JobRegistry>,
    started: Instant,
    bytes_sent: u64,
    finished: bool,
}

impl DeliveryStream {
    pub(crate) fn new(
        job_id: Uuid,
        content_type: &'static str,
        mut inner: ByteStream,
        token: AdmissionToken,
        registry: Arc<JobRegistry>,
    ) -> Self {
        let completion = inner.take_completion();
        Self {
            job_id,
            content_type,
            inner,
            completion,
            token: Some(token),
            registry,
            started: Instant::now(),
            bytes_sent: 0,
            finished: false,
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// MIME type of the bytes.
    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    fn finish(&mut self, state: JobState, error: Option<&PipelineError>, aborted: bool) {
        if self.finished {
            return;
        }
        self.finished = true;

        let result = match (state, aborted) {
            (JobState::StreamEnded, _) => "stream_ended",
            (_, true) => "aborted",
            _ => "failed",
        };
        self.registry
            .finish(self.job_id, state, error.map(ToString::to_string), aborted);
        if let Some(token) = self.token.take() {
            token.release();
        }
        record_outcome(DeliveryMode::Streamed, result, self.started.elapsed());

        match (error, aborted) {
            (Some(e), _) => warn!(
                job_id = %self.job_id,
                bytes = self.bytes_sent,
                error = %e,
                "Streamed job failed"
            ),
            (None, true) => info!(
                job_id = %self.job_id,
                bytes = self.bytes_sent,
                "{}",
                PipelineError::StreamAborted
            ),
            (None, false) => info!(
                job_id = %self.job_id,
                bytes = self.bytes_sent,
                duration_ms = self.started.elapsed().as_millis() as u64,
                "Streamed job finished"
            ),
        }
    }
}

impl Stream for DeliveryStream {
    type Item = Result<Bytes, PipelineError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(chunk))) => {
                this.bytes_sent += chunk.len() as u64;
                STREAMED_BYTES.inc_by(chunk.len() as u64);
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                let err = PipelineError::ExternalTool(e);
                this.finish(JobState::Failed, Some(&err), false);
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.finish(JobState::StreamEnded, None, false);
                Poll::Ready(None)
            }
        }
    }
}

impl Drop for DeliveryStream {
    fn drop(&mut self) {
        if !self.finished {
            self.inner.terminate();
            let token = self.token.take();
            self.finish(JobState::Failed, None, true);
            if let Some(token) = token {
                release_after_exit(token, self.completion.take());
            }
        }
    }
}

/// Releases the slot once the producer reports completion. Without a runtime
/// or a completion handle the slot is released immediately.
fn release_after_exit(token: AdmissionToken, completion: Option<StreamCompletion>) {
    match (completion, tokio::runtime::Handle::try_current()) {
        (Some(completion), Ok(runtime)) => {
            runtime.spawn(async move {
                let _ = completion.wait().await;
                token.release();
            });
        }
        _ => token.release(),
    }
}

impl std::fmt::Debug for DeliveryStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryStream")
            .field("job_id", &self.job_id)
            .field("content_type", &self.content_type)
            .field("bytes_sent", &self.bytes_sent)
            .field("finished", &self.finished)
            .finish()
    }
}
