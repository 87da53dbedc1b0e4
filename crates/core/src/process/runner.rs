//! Process runner implementation.

use std::collections::VecDeque;
use std::process::Stdio;
use std::time::Instant;

use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use super::config::ToolsConfig;
use super::error::ProcessError;
use super::stream::{ByteSink, ByteStream};
use super::types::{CommandSpec, ProcessOutput, ProcessResult};
use crate::metrics::TOOL_INVOCATIONS;

/// Maximum amount of stderr kept for error reports.
const STDERR_EXCERPT_BYTES: usize = 2048;

/// How long to wait for a stderr reader after its process is gone.
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Spawns external commands with a runtime ceiling.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
    read_chunk: usize,
}

/// One spawned stage of a (possibly piped) invocation.
struct Stage {
    label: String,
    child: Child,
    stderr: JoinHandle<String>,
}

enum PumpEnd {
    Eof,
    Cancelled,
    TimedOut,
    ReadFailed(std::io::Error),
}

impl ProcessRunner {
    /// Creates a runner whose invocations are killed after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            read_chunk: 64 * 1024,
        }
    }

    pub fn from_config(config: &ToolsConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            read_chunk: config.read_chunk_bytes.max(1),
        }
    }

    /// Runtime ceiling applied to each invocation.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs a command to completion and captures its stdout as text.
    pub async fn run(&self, spec: &CommandSpec) -> Result<ProcessResult, ProcessError> {
        let label = spec.label();
        let started = Instant::now();
        debug!(tool = %label, args = ?spec.args, "Running external tool");

        let mut child = spec
            .to_command()
            .spawn()
            .map_err(|e| ProcessError::spawn(&label, e))?;
        let stderr = forward_stderr(child.stderr.take(), label.clone());
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("stdout was not captured"))?;

        let outcome = time::timeout(self.timeout, async {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).await?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, buf))
        })
        .await;

        let (status, buf) = match outcome {
            Ok(result) => result?,
            Err(_) => {
                terminate_child(&mut child, &label).await;
                stderr.abort();
                TOOL_INVOCATIONS.with_label_values(&[&label, "timeout"]).inc();
                warn!(tool = %label, timeout_secs = self.timeout.as_secs(), "External tool timed out");
                return Err(ProcessError::Timeout {
                    program: label,
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        let stderr_excerpt = drain_stderr(stderr).await;

        if !status.success() {
            TOOL_INVOCATIONS.with_label_values(&[&label, "failed"]).inc();
            warn!(tool = %label, exit_code = ?status.code(), "External tool failed");
            return Err(ProcessError::NonZeroExit {
                program: label,
                exit_code: status.code(),
                stderr_excerpt,
            });
        }

        TOOL_INVOCATIONS.with_label_values(&[&label, "success"]).inc();
        Ok(ProcessResult {
            exit_code: status.code(),
            terminated: false,
            duration_ms: started.elapsed().as_millis() as u64,
            output: ProcessOutput::Captured {
                stdout: String::from_utf8_lossy(&buf).into_owned(),
            },
        })
    }

    /// Spawns a command and streams its stdout.
    pub fn run_streaming(
        &self,
        spec: &CommandSpec,
        buffer_chunks: usize,
    ) -> Result<ByteStream, ProcessError> {
        self.run_piped(std::slice::from_ref(spec), buffer_chunks)
    }

    /// Spawns a chain of commands, each stage's stdout feeding the next stage's
    /// stdin, and streams the last stage's stdout.
    ///
    /// Dropping or terminating the returned stream kills every stage.
    pub fn run_piped(
        &self,
        specs: &[CommandSpec],
        buffer_chunks: usize,
    ) -> Result<ByteStream, ProcessError> {
        if specs.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "no command to run",
            )
            .into());
        }

        let started = Instant::now();
        let mut stages: Vec<Stage> = Vec::with_capacity(specs.len());
        let mut upstream: Option<Stdio> = None;

        for (idx, spec) in specs.iter().enumerate() {
            let label = spec.label();
            debug!(tool = %label, args = ?spec.args, "Spawning streaming stage");

            let mut command = spec.to_command();
            if let Some(stdin) = upstream.take() {
                command.stdin(stdin);
            }
            // Earlier stages are dropped (and killed) if this spawn fails.
            let mut child = command
                .spawn()
                .map_err(|e| ProcessError::spawn(&label, e))?;

            if idx + 1 < specs.len() {
                let stdout = child
                    .stdout
                    .take()
                    .ok_or_else(|| std::io::Error::other("stdout was not captured"))?;
                let next_stdin: Stdio = stdout.try_into()?;
                upstream = Some(next_stdin);
            }

            let stderr = forward_stderr(child.stderr.take(), label.clone());
            stages.push(Stage {
                label,
                child,
                stderr,
            });
        }

        let stdout = stages
            .last_mut()
            .and_then(|stage| stage.child.stdout.take())
            .ok_or_else(|| std::io::Error::other("stdout was not captured"))?;

        let (sink, stream) = ByteStream::channel(buffer_chunks);
        let deadline = time::Instant::now() + self.timeout;
        tokio::spawn(pump(
            stages,
            stdout,
            sink,
            deadline,
            self.timeout,
            self.read_chunk,
            started,
        ));

        Ok(stream)
    }
}

/// Moves stdout chunks into the sink until EOF, cancellation or deadline,
/// then reaps every stage and publishes the result.
///
/// Time spent waiting for the consumer to accept a chunk is added back to the
/// deadline, so a slow client never causes a tool timeout.
async fn pump(
    stages: Vec<Stage>,
    stdout: ChildStdout,
    sink: ByteSink,
    deadline: time::Instant,
    limit: Duration,
    read_chunk: usize,
    started: Instant,
) {
    let mut stages = stages;
    let mut deadline = deadline;
    let mut chunks = ReaderStream::with_capacity(stdout, read_chunk);
    let expiry = time::sleep_until(deadline);
    tokio::pin!(expiry);
    let mut bytes: u64 = 0;

    let end = loop {
        tokio::select! {
            biased;
            _ = sink.cancelled() => break PumpEnd::Cancelled,
            _ = &mut expiry => break PumpEnd::TimedOut,
            next = chunks.next() => match next {
                Some(Ok(chunk)) => {
                    bytes += chunk.len() as u64;
                    let blocked = time::Instant::now();
                    if !sink.send(chunk).await {
                        break PumpEnd::Cancelled;
                    }
                    deadline += blocked.elapsed();
                    expiry.as_mut().reset(deadline);
                }
                Some(Err(e)) => break PumpEnd::ReadFailed(e),
                None => break PumpEnd::Eof,
            },
        }
    };
    drop(chunks);

    let program = stages
        .iter()
        .map(|stage| stage.label.as_str())
        .collect::<Vec<_>>()
        .join("|");

    let (terminated, mut failure) = match end {
        PumpEnd::Eof => (false, None),
        PumpEnd::Cancelled => (true, None),
        PumpEnd::TimedOut => (
            true,
            Some(ProcessError::Timeout {
                program: program.clone(),
                timeout_secs: limit.as_secs(),
            }),
        ),
        PumpEnd::ReadFailed(e) => (true, Some(ProcessError::Io(e))),
    };

    if terminated {
        for stage in stages.iter_mut() {
            terminate_child(&mut stage.child, &stage.label).await;
        }
    }

    let mut exit_code = None;
    for mut stage in stages {
        let status = match time::timeout_at(deadline, stage.child.wait()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                failure.get_or_insert(ProcessError::Io(e));
                None
            }
            Err(_) => {
                terminate_child(&mut stage.child, &stage.label).await;
                failure.get_or_insert(ProcessError::Timeout {
                    program: stage.label.clone(),
                    timeout_secs: limit.as_secs(),
                });
                None
            }
        };
        let excerpt = drain_stderr(stage.stderr).await;

        if let Some(status) = status {
            exit_code = status.code();
            if !terminated && !status.success() && failure.is_none() {
                failure = Some(ProcessError::NonZeroExit {
                    program: stage.label.clone(),
                    exit_code: status.code(),
                    stderr_excerpt: excerpt,
                });
            }
        }
    }

    let outcome = match (&failure, terminated) {
        (Some(ProcessError::Timeout { .. }), _) => "timeout",
        (Some(_), _) => "failed",
        (None, true) => "terminated",
        (None, false) => "success",
    };
    TOOL_INVOCATIONS.with_label_values(&[&program, outcome]).inc();

    match &failure {
        Some(e) => warn!(tool = %program, bytes, error = %e, "Streaming invocation failed"),
        None if terminated => info!(tool = %program, bytes, "Streaming invocation terminated"),
        None => debug!(tool = %program, bytes, "Streaming invocation finished"),
    }

    if let Some(e) = failure {
        sink.fail(e).await;
    }

    sink.complete(ProcessResult {
        exit_code,
        terminated,
        duration_ms: started.elapsed().as_millis() as u64,
        output: ProcessOutput::Streamed { bytes },
    });
}

/// Kills a child and reaps it. Safe to call after the child already exited.
async fn terminate_child(child: &mut Child, label: &str) {
    if let Err(e) = child.start_kill() {
        debug!(tool = %label, error = %e, "Kill skipped, process already gone");
    }
    if let Err(e) = child.wait().await {
        debug!(tool = %label, error = %e, "Failed to reap process");
    }
}

/// Logs stderr lines as they arrive and returns the tail.
fn forward_stderr(stderr: Option<ChildStderr>, label: String) -> JoinHandle<String> {
    tokio::spawn(async move {
        let Some(stderr) = stderr else {
            return String::new();
        };
        let mut lines = BufReader::new(stderr).lines();
        let mut tail = StderrTail::default();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(tool = %label, "{}", line);
            tail.push(line);
        }
        tail.into_excerpt()
    })
}

async fn drain_stderr(handle: JoinHandle<String>) -> String {
    match time::timeout(STDERR_DRAIN_TIMEOUT, handle).await {
        Ok(Ok(excerpt)) => excerpt,
        _ => String::new(),
    }
}

/// Bounded buffer of the most recent stderr lines.
#[derive(Default)]
struct StderrTail {
    lines: VecDeque<String>,
    bytes: usize,
}

impl StderrTail {
    fn push(&mut self, line: String) {
        self.bytes += line.len() + 1;
        self.lines.push_back(line);
        while self.bytes > STDERR_EXCERPT_BYTES && self.lines.len() > 1 {
            if let Some(dropped) = self.lines.pop_front() {
                self.bytes -= dropped.len() + 1;
            }
        }
    }

    fn into_excerpt(self) -> String {
        Vec::from(self.lines).join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_tail_keeps_recent_lines() {
        let mut tail = StderrTail::default();
        for i in 0..1000 {
            tail.push(format!("line {}", i));
        }
        let excerpt = tail.into_excerpt();
        assert!(excerpt.len() <= STDERR_EXCERPT_BYTES);
        assert!(excerpt.ends_with("line 999"));
        assert!(!excerpt.contains("line 0\n"));
    }

    #[test]
    fn test_stderr_tail_keeps_single_long_line() {
        let mut tail = StderrTail::default();
        tail.push("x".repeat(STDERR_EXCERPT_BYTES * 2));
        assert_eq!(tail.into_excerpt().len(), STDERR_EXCERPT_BYTES * 2);
    }

    #[test]
    fn test_runner_from_config() {
        let config = ToolsConfig::default().with_timeout(42);
        let runner = ProcessRunner::from_config(&config);
        assert_eq!(runner.timeout(), Duration::from_secs(42));
    }

    #[tokio::test]
    async fn test_run_missing_binary() {
        let runner = ProcessRunner::new(Duration::from_secs(5));
        let spec = CommandSpec::new("/nonexistent/definitely-not-a-tool");
        let err = runner.run(&spec).await.unwrap_err();
        assert!(matches!(err, ProcessError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_run_piped_requires_a_command() {
        let runner = ProcessRunner::new(Duration::from_secs(5));
        assert!(runner.run_piped(&[], 4).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_stdout() {
        let runner = ProcessRunner::new(Duration::from_secs(5));
        let spec = CommandSpec::new("sh").args(["-c", "echo hello; echo noise >&2"]);
        let result = runner.run(&spec).await.unwrap();
        assert_eq!(result.stdout().trim(), "hello");
        assert_eq!(result.exit_code, Some(0));
        assert!(result.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_non_zero_exit_keeps_stderr() {
        let runner = ProcessRunner::new(Duration::from_secs(5));
        let spec = CommandSpec::new("sh").args(["-c", "echo 'ERROR: blocked' >&2; exit 3"]);
        let err = runner.run(&spec).await.unwrap_err();
        assert_eq!(err.exit_code(), Some(3));
        assert_eq!(err.stderr_excerpt(), Some("ERROR: blocked"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_times_out() {
        let runner = ProcessRunner::new(Duration::from_millis(200));
        let spec = CommandSpec::new("sh").args(["-c", "sleep 30"]);
        let started = Instant::now();
        let err = runner.run(&spec).await.unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
