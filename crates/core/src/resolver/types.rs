//! Types for the resolver module.

use serde::{Deserialize, Serialize};

/// Placeholder for missing text fields.
pub const UNKNOWN: &str = "Unknown";

/// Rendered size when the extractor cannot estimate one.
pub const UNKNOWN_SIZE: &str = "Unknown size";

/// Best-effort description of a remote source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: String,
    pub author: String,
    /// Estimated download size, if the extractor reported one.
    pub approx_size_bytes: Option<u64>,
    pub duration_secs: Option<f64>,
}

impl Metadata {
    /// Metadata for a source the extractor said nothing useful about.
    pub fn unknown() -> Self {
        Self {
            title: UNKNOWN.to_string(),
            author: UNKNOWN.to_string(),
            approx_size_bytes: None,
            duration_secs: None,
        }
    }

    /// Size rendered as `"12.3 MB"` or `"Unknown size"`.
    pub fn display_size(&self) -> String {
        format_size(self.approx_size_bytes)
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Result of a size-only probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeEstimate {
    /// Human readable size.
    pub size: String,
    pub size_bytes: Option<u64>,
}

impl SizeEstimate {
    pub fn from_bytes(size_bytes: Option<u64>) -> Self {
        Self {
            size: format_size(size_bytes),
            size_bytes,
        }
    }

    pub fn unknown() -> Self {
        Self::from_bytes(None)
    }
}

/// Formats a byte count in mebibytes with one decimal.
pub fn format_size(size_bytes: Option<u64>) -> String {
    match size_bytes {
        Some(bytes) => format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0)),
        None => UNKNOWN_SIZE.to_string(),
    }
}
