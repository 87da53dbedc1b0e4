//! Process module for running external command-line tools.
//!
//! Two invocation styles are supported:
//!
//! - [`ProcessRunner::run`] waits for the process and captures stdout as text.
//! - [`ProcessRunner::run_streaming`] / [`ProcessRunner::run_piped`] hand back a
//!   [`ByteStream`] of stdout chunks while the process is still running.
//!
//! Every invocation is bounded by the configured timeout. stderr is logged at
//! `debug` and a short tail is kept for error reports; it never reaches the
//! byte stream.
//!
//! # Example
//!
//! ```ignore
//! use audiograb_core::process::{CommandSpec, ProcessRunner};
//!
//! let runner = ProcessRunner::new(Duration::from_secs(30));
//! let result = runner.run(&CommandSpec::new("yt-dlp").arg("--version")).await?;
//! println!("{}", result.stdout());
//!
//! let mut stream = runner.run_piped(&[producer, encoder], 32)?;
//! while let Some(chunk) = stream.next().await {
//!     sink.write_all(&chunk?).await?;
//! }
//! ```

mod config;
mod error;
mod runner;
mod stream;
mod types;

pub use config::ToolsConfig;
pub use error::ProcessError;
pub use runner::ProcessRunner;
pub use stream::{ByteSink, ByteStream, StreamCompletion};
pub use types::{CommandSpec, ProcessOutput, ProcessResult};
