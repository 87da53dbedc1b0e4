//! Mock transcoder for testing.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::process::{ByteStream, ProcessError, ProcessOutput, ProcessResult};
use crate::transcode::{AudioFormat, TagSet, TranscodeError, Transcoder};

/// How the mock producer behaves for `stream`.
#[derive(Debug, Clone)]
pub struct MockStreamPlan {
    /// Payload of each chunk.
    pub chunk: Bytes,
    /// Number of chunks, `None` for an endless stream.
    pub chunks: Option<usize>,
    /// Pause before each chunk.
    pub interval: Duration,
    /// Error yielded after the last chunk.
    pub fail_at_end: bool,
}

impl Default for MockStreamPlan {
    fn default() -> Self {
        Self {
            chunk: Bytes::from_static(b"mock-audio-chunk"),
            chunks: Some(4),
            interval: Duration::ZERO,
            fail_at_end: false,
        }
    }
}

/// Mock implementation of the Transcoder trait.
///
/// Provides controllable behavior for testing:
/// - Writes a fixed payload to the working path
/// - Simulated latency, failures that leave a half-written file behind
/// - Reports success without producing output
/// - Scripted streaming with observable cancellation
#[derive(Debug)]
pub struct MockTranscoder {
    format: AudioFormat,
    payload: Mutex<Vec<u8>>,
    delay: Mutex<Duration>,
    next_error: Mutex<Option<TranscodeError>>,
    produce_output: AtomicBool,
    fail_tagging: AtomicBool,
    stream_plan: Mutex<MockStreamPlan>,
    materialized: Mutex<Vec<PathBuf>>,
    tagged: Mutex<Vec<(PathBuf, TagSet)>>,
    chunks_sent: Arc<AtomicU64>,
    stream_cancelled: Arc<AtomicBool>,
}

impl Default for MockTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTranscoder {
    /// Create a new mock transcoder producing MP3.
    pub fn new() -> Self {
        Self {
            format: AudioFormat::Mp3,
            payload: Mutex::new(b"ID3mock-audio-payload".to_vec()),
            delay: Mutex::new(Duration::ZERO),
            next_error: Mutex::new(None),
            produce_output: AtomicBool::new(true),
            fail_tagging: AtomicBool::new(false),
            stream_plan: Mutex::new(MockStreamPlan::default()),
            materialized: Mutex::new(Vec::new()),
            tagged: Mutex::new(Vec::new()),
            chunks_sent: Arc::new(AtomicU64::new(0)),
            stream_cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set the simulated materialize duration.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Configure the next materialize to write half the payload and fail.
    pub fn set_next_error(&self, error: TranscodeError) {
        *self.next_error.lock() = Some(error);
    }

    /// When false, materialize succeeds without creating the file.
    pub fn set_produce_output(&self, produce: bool) {
        self.produce_output.store(produce, Ordering::SeqCst);
    }

    pub fn set_fail_tagging(&self, fail: bool) {
        self.fail_tagging.store(fail, Ordering::SeqCst);
    }

    pub fn set_stream_plan(&self, plan: MockStreamPlan) {
        *self.stream_plan.lock() = plan;
    }

    /// Working paths passed to materialize.
    pub fn materialized(&self) -> Vec<PathBuf> {
        self.materialized.lock().clone()
    }

    /// Files passed to tag, with their tags.
    pub fn tagged(&self) -> Vec<(PathBuf, TagSet)> {
        self.tagged.lock().clone()
    }

    /// Chunks handed to consumers across all streams.
    pub fn chunks_sent(&self) -> u64 {
        self.chunks_sent.load(Ordering::SeqCst)
    }

    /// Whether a producer observed its consumer going away.
    pub fn stream_cancelled(&self) -> bool {
        self.stream_cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    fn name(&self) -> &str {
        "mock"
    }

    fn format(&self) -> AudioFormat {
        self.format
    }

    async fn materialize(
        &self,
        _source_url: &str,
        working_path: &Path,
    ) -> Result<(), TranscodeError> {
        self.materialized.lock().push(working_path.to_path_buf());

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let payload = self.payload.lock().clone();
        let next_error = self.next_error.lock().take();
        if let Some(err) = next_error {
            // Simulate a tool dying mid-write.
            tokio::fs::write(working_path, &payload[..payload.len() / 2]).await?;
            return Err(err);
        }

        if self.produce_output.load(Ordering::SeqCst) {
            tokio::fs::write(working_path, &payload).await?;
        }
        Ok(())
    }

    fn stream(&self, _source_url: &str, buffer_chunks: usize) -> Result<ByteStream, TranscodeError> {
        let plan = self.stream_plan.lock().clone();
        let chunks_sent = Arc::clone(&self.chunks_sent);
        let cancelled = Arc::clone(&self.stream_cancelled);
        let (sink, stream) = ByteStream::channel(buffer_chunks);

        tokio::spawn(async move {
            let mut sent = 0usize;
            let mut bytes = 0u64;
            let mut terminated = false;

            while plan.chunks.map_or(true, |limit| sent < limit) {
                tokio::select! {
                    _ = sink.cancelled() => {
                        terminated = true;
                        break;
                    }
                    _ = tokio::time::sleep(plan.interval) => {}
                }
                if !sink.send(plan.chunk.clone()).await {
                    terminated = true;
                    break;
                }
                sent += 1;
                bytes += plan.chunk.len() as u64;
                chunks_sent.fetch_add(1, Ordering::SeqCst);
            }

            if terminated {
                cancelled.store(true, Ordering::SeqCst);
            } else if plan.fail_at_end {
                sink.fail(ProcessError::NonZeroExit {
                    program: "ffmpeg".to_string(),
                    exit_code: Some(1),
                    stderr_excerpt: "pipe:0: Invalid data found when processing input".to_string(),
                })
                .await;
            }

            sink.complete(ProcessResult {
                exit_code: if terminated { None } else { Some(0) },
                terminated,
                duration_ms: 0,
                output: ProcessOutput::Streamed { bytes },
            });
        });

        Ok(stream)
    }

    async fn tag(&self, path: &Path, tags: &TagSet) -> Result<(), TranscodeError> {
        if self.fail_tagging.load(Ordering::SeqCst) {
            return Err(TranscodeError::Tool(ProcessError::NonZeroExit {
                program: "ffmpeg".to_string(),
                exit_code: Some(1),
                stderr_excerpt: "tagging failed".to_string(),
            }));
        }
        self.tagged.lock().push((path.to_path_buf(), tags.clone()));
        Ok(())
    }

    async fn validate(&self) -> Result<(), TranscodeError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_scripted_failure_leaves_partial_file_from_spawned_task() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("job.partial.mp3");
        let transcoder = Arc::new(MockTranscoder::new());
        transcoder.set_next_error(TranscodeError::Tool(ProcessError::Terminated {
            program: "ffmpeg".to_string(),
        }));

        let task = {
            let transcoder = Arc::clone(&transcoder);
            let path = path.clone();
            tokio::spawn(async move { transcoder.materialize("https://youtu.be/x", &path).await })
        };
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, TranscodeError::Tool(_)));
        assert_eq!(std::fs::read(&path).unwrap(), b"ID3mock-au".to_vec());

        // The error is consumed; the next run succeeds.
        transcoder.materialize("https://youtu.be/x", &path).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"ID3mock-audio-payload".to_vec());
    }
}
