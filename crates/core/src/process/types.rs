//! Types for the process module.

use serde::Serialize;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// An external command: executable plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Path or name of the executable.
    pub program: PathBuf,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Short name used in logs and errors (file name of the executable).
    pub fn label(&self) -> String {
        self.program
            .file_name()
            .unwrap_or_else(|| OsStr::new("process"))
            .to_string_lossy()
            .into_owned()
    }

    /// Builds a tokio command with null stdin, piped stdout/stderr and kill-on-drop.
    pub(crate) fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// Whether the argument list contains `value` anywhere.
    pub fn has_arg(&self, value: &str) -> bool {
        self.args.iter().any(|a| a == value)
    }
}

/// What a finished process produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessOutput {
    /// Stdout captured as text.
    Captured { stdout: String },
    /// Stdout was forwarded as a live byte stream.
    Streamed { bytes: u64 },
}

/// Outcome of one external process invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessResult {
    /// Exit code, `None` when killed by a signal.
    pub exit_code: Option<i32>,
    /// Whether the process was terminated by us (cancel or timeout).
    pub terminated: bool,
    /// Wall-clock runtime.
    pub duration_ms: u64,
    pub output: ProcessOutput,
}

impl ProcessResult {
    /// Captured stdout, empty for streamed invocations.
    pub fn stdout(&self) -> &str {
        match &self.output {
            ProcessOutput::Captured { stdout } => stdout,
            ProcessOutput::Streamed { .. } => "",
        }
    }

    /// Number of bytes forwarded, zero for captured invocations.
    pub fn streamed_bytes(&self) -> u64 {
        match &self.output {
            ProcessOutput::Captured { .. } => 0,
            ProcessOutput::Streamed { bytes } => *bytes,
        }
    }

    pub fn success(&self) -> bool {
        !self.terminated && self.exit_code == Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_builder() {
        let spec = CommandSpec::new("/usr/local/bin/yt-dlp")
            .arg("--dump-json")
            .args(["--no-playlist", "https://youtu.be/abc"]);

        assert_eq!(spec.label(), "yt-dlp");
        assert_eq!(spec.args.len(), 3);
        assert!(spec.has_arg("--no-playlist"));
        assert!(!spec.has_arg("--output"));
    }

    #[test]
    fn test_process_result_accessors() {
        let captured = ProcessResult {
            exit_code: Some(0),
            terminated: false,
            duration_ms: 12,
            output: ProcessOutput::Captured {
                stdout: "hello".to_string(),
            },
        };
        assert_eq!(captured.stdout(), "hello");
        assert_eq!(captured.streamed_bytes(), 0);
        assert!(captured.success());

        let streamed = ProcessResult {
            exit_code: None,
            terminated: true,
            duration_ms: 40,
            output: ProcessOutput::Streamed { bytes: 4096 },
        };
        assert_eq!(streamed.stdout(), "");
        assert_eq!(streamed.streamed_bytes(), 4096);
        assert!(!streamed.success());
    }
}
