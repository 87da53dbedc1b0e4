//! Resolver module for source metadata.
//!
//! A resolver runs the extractor in probe mode (no media is downloaded) and
//! turns its JSON output into [`Metadata`]. Upstream metadata is best-effort:
//! missing fields become `"Unknown"` instead of errors.

mod error;
mod traits;
mod types;
mod ytdlp;

pub use error::ResolveError;
pub use traits::MetadataResolver;
pub use types::{format_size, Metadata, SizeEstimate, UNKNOWN, UNKNOWN_SIZE};
pub use ytdlp::YtDlpResolver;
