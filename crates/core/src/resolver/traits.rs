//! Trait definitions for the resolver module.

use async_trait::async_trait;

use super::error::ResolveError;
use super::types::{Metadata, SizeEstimate};

/// Looks up information about a source without downloading it.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Returns the name of this resolver implementation.
    fn name(&self) -> &str;

    /// Probes title, author, size and duration.
    ///
    /// Missing or unparseable fields fall back to [`Metadata::unknown`] values;
    /// only a failing tool is an error.
    async fn probe(&self, source_url: &str) -> Result<Metadata, ResolveError>;

    /// Estimates the size of the converted audio.
    async fn probe_size(&self, source_url: &str) -> Result<SizeEstimate, ResolveError>;
}
