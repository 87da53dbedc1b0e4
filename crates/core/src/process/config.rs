//! Configuration for external tools.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Locations of the external tools and the runtime ceiling for each invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to the extractor binary (yt-dlp).
    #[serde(default = "default_extractor_path")]
    pub extractor_path: PathBuf,

    /// Path to the transcoder binary (ffmpeg).
    #[serde(default = "default_transcoder_path")]
    pub transcoder_path: PathBuf,

    /// Maximum runtime of a single tool invocation in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Chunk size used when reading streamed output.
    #[serde(default = "default_read_chunk")]
    pub read_chunk_bytes: usize,
}

fn default_extractor_path() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_transcoder_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_timeout() -> u64 {
    600 // 10 minutes
}

fn default_read_chunk() -> usize {
    64 * 1024
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            extractor_path: default_extractor_path(),
            transcoder_path: default_transcoder_path(),
            timeout_secs: default_timeout(),
            read_chunk_bytes: default_read_chunk(),
        }
    }
}

impl ToolsConfig {
    /// Creates a config with custom tool paths.
    pub fn with_paths(extractor_path: PathBuf, transcoder_path: PathBuf) -> Self {
        Self {
            extractor_path,
            transcoder_path,
            ..Default::default()
        }
    }

    /// Sets the per-invocation timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ToolsConfig::default();
        assert_eq!(config.extractor_path, PathBuf::from("yt-dlp"));
        assert_eq!(config.transcoder_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.timeout_secs, 600);
    }

    #[test]
    fn test_config_builder() {
        let config = ToolsConfig::with_paths(
            PathBuf::from("/usr/local/bin/yt-dlp"),
            PathBuf::from("/opt/homebrew/bin/ffmpeg"),
        )
        .with_timeout(120);

        assert_eq!(config.extractor_path, PathBuf::from("/usr/local/bin/yt-dlp"));
        assert_eq!(config.transcoder_path, PathBuf::from("/opt/homebrew/bin/ffmpeg"));
        assert_eq!(config.timeout_secs, 120);
    }
}
