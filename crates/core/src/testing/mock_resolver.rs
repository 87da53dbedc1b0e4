//! Mock resolver for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;

use crate::resolver::{Metadata, MetadataResolver, ResolveError, SizeEstimate};

/// Mock implementation of the MetadataResolver trait.
///
/// Provides controllable behavior for testing:
/// - Fixed metadata and size answers
/// - Simulated probe latency
/// - One-shot failures
/// - Recorded probe URLs for assertions
#[derive(Debug)]
pub struct MockResolver {
    metadata: Mutex<Metadata>,
    size_bytes: Mutex<Option<u64>>,
    delay: Mutex<Duration>,
    next_error: Mutex<Option<ResolveError>>,
    probed: Mutex<Vec<String>>,
}

impl Default for MockResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockResolver {
    /// Create a mock resolver answering with "Mock Title" by "Mock Author".
    pub fn new() -> Self {
        Self {
            metadata: Mutex::new(Metadata {
                title: "Mock Title".to_string(),
                author: "Mock Author".to_string(),
                approx_size_bytes: Some(3 * 1024 * 1024),
                duration_secs: Some(180.0),
            }),
            size_bytes: Mutex::new(Some(3 * 1024 * 1024)),
            delay: Mutex::new(Duration::ZERO),
            next_error: Mutex::new(None),
            probed: Mutex::new(Vec::new()),
        }
    }

    pub fn set_metadata(&self, metadata: Metadata) {
        *self.metadata.lock() = metadata;
    }

    pub fn set_size(&self, size_bytes: Option<u64>) {
        *self.size_bytes.lock() = size_bytes;
    }

    /// Set the simulated probe duration.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Configure the next probe to fail with the given error.
    pub fn set_next_error(&self, error: ResolveError) {
        *self.next_error.lock() = Some(error);
    }

    /// URLs probed so far, in order.
    pub fn probed_urls(&self) -> Vec<String> {
        self.probed.lock().clone()
    }

    async fn begin(&self, source_url: &str) -> Result<(), ResolveError> {
        self.probed.lock().push(source_url.to_string());
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match self.next_error.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MetadataResolver for MockResolver {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self, source_url: &str) -> Result<Metadata, ResolveError> {
        self.begin(source_url).await?;
        Ok(self.metadata.lock().clone())
    }

    async fn probe_size(&self, source_url: &str) -> Result<SizeEstimate, ResolveError> {
        self.begin(source_url).await?;
        Ok(SizeEstimate::from_bytes(*self.size_bytes.lock()))
    }
}
