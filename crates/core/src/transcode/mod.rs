//! Transcode module for producing audio from a source URL.
//!
//! Buffered jobs call [`Transcoder::materialize`] to write a file at the
//! workspace's working path; streamed jobs call [`Transcoder::stream`], which
//! pipes the extractor straight into the encoder without touching disk.
//! [`Transcoder::tag`] is a best-effort post step.
//!
//! # Example
//!
//! ```ignore
//! use audiograb_core::transcode::{AudioFormat, Transcoder, YtDlpTranscoder};
//!
//! let transcoder = YtDlpTranscoder::new(&tools, AudioFormat::Mp3, "0");
//! transcoder.validate().await?;
//! transcoder.materialize(url, handle.working_path()).await?;
//! ```

mod error;
mod traits;
mod types;
mod ytdlp;

pub use error::TranscodeError;
pub use traits::Transcoder;
pub use types::{AudioFormat, TagSet};
pub use ytdlp::YtDlpTranscoder;
