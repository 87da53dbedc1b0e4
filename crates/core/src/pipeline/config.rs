//! Pipeline configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::transcode::AudioFormat;

/// Accepts `youtube.com/...`, `m.youtube.com/...`, `youtu.be/...` with or without scheme.
pub const DEFAULT_SOURCE_PATTERN: &str = r"^(https?://)?(www\.|m\.)?(youtube\.com|youtu\.?be)/.+";

/// Configuration for the pipeline coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of jobs in flight at once.
    /// Submissions beyond this are rejected, never queued.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Directory holding working files and finished artifacts.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// URL path under which artifacts are served.
    #[serde(default = "default_public_path")]
    pub public_path: String,

    /// Target audio format.
    #[serde(default)]
    pub audio_format: AudioFormat,

    /// Extractor/encoder quality: `0`-`9` VBR level or a bitrate such as `192K`.
    #[serde(default = "default_audio_quality")]
    pub audio_quality: String,

    /// Chunks buffered between a streaming process and a slow client.
    #[serde(default = "default_stream_buffer_chunks")]
    pub stream_buffer_chunks: usize,

    /// Write title/artist/album tags into buffered artifacts.
    #[serde(default = "default_embed_tags")]
    pub embed_tags: bool,

    /// Album tag written into every artifact.
    #[serde(default = "default_tag_album")]
    pub tag_album: String,

    /// Regex a source URL must match before admission is attempted.
    #[serde(default = "default_source_pattern")]
    pub source_pattern: String,
}

fn default_max_concurrent_jobs() -> usize {
    100
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_public_path() -> String {
    "/downloads".to_string()
}

fn default_audio_quality() -> String {
    "0".to_string()
}

fn default_stream_buffer_chunks() -> usize {
    32
}

fn default_embed_tags() -> bool {
    true
}

fn default_tag_album() -> String {
    "YouTube".to_string()
}

fn default_source_pattern() -> String {
    DEFAULT_SOURCE_PATTERN.to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            output_dir: default_output_dir(),
            public_path: default_public_path(),
            audio_format: AudioFormat::default(),
            audio_quality: default_audio_quality(),
            stream_buffer_chunks: default_stream_buffer_chunks(),
            embed_tags: default_embed_tags(),
            tag_album: default_tag_album(),
            source_pattern: default_source_pattern(),
        }
    }
}

impl PipelineConfig {
    /// Public URL of an artifact file name.
    pub fn public_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.public_path.trim_end_matches('/'), file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_concurrent_jobs, 100);
        assert_eq!(config.output_dir, PathBuf::from("downloads"));
        assert_eq!(config.audio_format, AudioFormat::Mp3);
        assert!(config.embed_tags);
        assert_eq!(config.tag_album, "YouTube");
    }

    #[test]
    fn test_public_url() {
        let mut config = PipelineConfig::default();
        assert_eq!(config.public_url("abc.mp3"), "/downloads/abc.mp3");
        config.public_path = "/files/".to_string();
        assert_eq!(config.public_url("abc.mp3"), "/files/abc.mp3");
    }

    #[test]
    fn test_partial_toml() {
        let config: PipelineConfig = toml::from_str(
            r#"
max_concurrent_jobs = 4
audio_format = "opus"
"#,
        )
        .unwrap();
        assert_eq!(config.max_concurrent_jobs, 4);
        assert_eq!(config.audio_format, AudioFormat::Opus);
        assert_eq!(config.public_path, "/downloads");
    }
}
