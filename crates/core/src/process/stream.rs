//! Live byte channel between a producer (usually a child process) and a sink.

use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::error::ProcessError;
use super::types::ProcessResult;

type Chunk = Result<Bytes, ProcessError>;

/// Consumer side: an ordered, finite sequence of byte chunks.
///
/// Dropping the stream, or calling [`ByteStream::terminate`], cancels the
/// producer. After cancellation no further chunks are yielded even if some
/// were already buffered.
pub struct ByteStream {
    rx: mpsc::Receiver<Chunk>,
    cancel: CancellationToken,
    completion: Option<oneshot::Receiver<ProcessResult>>,
}

/// Producer side of a [`ByteStream`].
pub struct ByteSink {
    tx: mpsc::Sender<Chunk>,
    cancel: CancellationToken,
    completion: Option<oneshot::Sender<ProcessResult>>,
}

/// Resolves to the producer's final [`ProcessResult`].
pub struct StreamCompletion {
    rx: oneshot::Receiver<ProcessResult>,
}

impl ByteStream {
    /// Creates a connected sink/stream pair buffering up to `capacity` chunks.
    pub fn channel(capacity: usize) -> (ByteSink, ByteStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (done_tx, done_rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        let sink = ByteSink {
            tx,
            cancel: cancel.clone(),
            completion: Some(done_tx),
        };
        let stream = ByteStream {
            rx,
            cancel,
            completion: Some(done_rx),
        };
        (sink, stream)
    }

    /// Asks the producer to stop. Idempotent.
    pub fn terminate(&self) {
        self.cancel.cancel();
    }

    pub fn is_terminated(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Takes the completion handle. Returns `None` on the second call.
    pub fn take_completion(&mut self) -> Option<StreamCompletion> {
        self.completion.take().map(|rx| StreamCompletion { rx })
    }
}

impl Stream for ByteStream {
    type Item = Chunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

impl Drop for ByteStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl ByteSink {
    /// Sends one chunk. Returns `false` once the consumer is gone or has cancelled.
    pub async fn send(&self, chunk: Bytes) -> bool {
        self.deliver(Ok(chunk)).await
    }

    /// Sends a terminal error to the consumer.
    pub async fn fail(&self, error: ProcessError) -> bool {
        self.deliver(Err(error)).await
    }

    async fn deliver(&self, item: Chunk) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            sent = self.tx.send(item) => sent.is_ok(),
            _ = self.cancel.cancelled() => false,
        }
    }

    /// Resolves once the consumer cancels or drops the stream.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Publishes the final result and closes the channel.
    pub fn complete(mut self, result: ProcessResult) {
        if let Some(done) = self.completion.take() {
            let _ = done.send(result);
        }
    }
}

impl StreamCompletion {
    /// Waits for the producer to finish. `None` if it vanished without reporting.
    pub async fn wait(self) -> Option<ProcessResult> {
        self.rx.await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessOutput;
    use futures::StreamExt;

    fn streamed(bytes: u64, terminated: bool) -> ProcessResult {
        ProcessResult {
            exit_code: if terminated { None } else { Some(0) },
            terminated,
            duration_ms: 0,
            output: ProcessOutput::Streamed { bytes },
        }
    }

    #[tokio::test]
    async fn test_chunks_arrive_in_order() {
        let (sink, mut stream) = ByteStream::channel(4);
        let completion = stream.take_completion().unwrap();
        assert!(stream.take_completion().is_none());

        tokio::spawn(async move {
            for part in ["a", "b", "c"] {
                assert!(sink.send(Bytes::from(part)).await);
            }
            sink.complete(streamed(3, false));
        });

        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, b"abc");

        let result = completion.wait().await.unwrap();
        assert_eq!(result.streamed_bytes(), 3);
        assert!(!result.terminated);
    }

    #[tokio::test]
    async fn test_terminate_stops_yielding_buffered_chunks() {
        let (sink, mut stream) = ByteStream::channel(8);
        assert!(sink.send(Bytes::from_static(b"one")).await);
        assert!(sink.send(Bytes::from_static(b"two")).await);

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(&first[..], b"one");

        stream.terminate();
        assert!(stream.is_terminated());
        assert!(stream.next().await.is_none());
        assert!(sink.is_cancelled());
        assert!(!sink.send(Bytes::from_static(b"three")).await);
    }

    #[tokio::test]
    async fn test_drop_cancels_producer() {
        let (sink, stream) = ByteStream::channel(1);
        drop(stream);
        tokio::time::timeout(std::time::Duration::from_secs(1), sink.cancelled())
            .await
            .expect("drop should cancel the sink");
    }

    #[tokio::test]
    async fn test_send_unblocks_on_cancel_when_full() {
        let (sink, stream) = ByteStream::channel(1);
        assert!(sink.send(Bytes::from_static(b"fill")).await);

        let cancel = stream.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            cancel.cancel();
        });

        // Channel is full; this must return false once cancelled instead of hanging.
        assert!(!sink.send(Bytes::from_static(b"blocked")).await);
        drop(stream);
    }
}
