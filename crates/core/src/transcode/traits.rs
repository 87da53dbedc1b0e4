//! Trait definitions for the transcode module.

use async_trait::async_trait;
use std::path::Path;

use super::error::TranscodeError;
use super::types::{AudioFormat, TagSet};
use crate::process::ByteStream;

/// Turns a source URL into audio, either on disk or as a live stream.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Returns the name of this transcoder implementation.
    fn name(&self) -> &str;

    /// Format produced by this transcoder.
    fn format(&self) -> AudioFormat;

    /// Downloads and converts the source into `working_path`.
    ///
    /// Success only means the tools exited cleanly and the file exists;
    /// the content is not inspected.
    async fn materialize(&self, source_url: &str, working_path: &Path)
        -> Result<(), TranscodeError>;

    /// Starts a download piped through the encoder. No file is written.
    ///
    /// Dropping the returned stream kills both processes.
    fn stream(&self, source_url: &str, buffer_chunks: usize) -> Result<ByteStream, TranscodeError>;

    /// Rewrites the file at `path` with the given tags.
    async fn tag(&self, path: &Path, tags: &TagSet) -> Result<(), TranscodeError>;

    /// Validates that the external tools are installed and runnable.
    async fn validate(&self) -> Result<(), TranscodeError>;
}
