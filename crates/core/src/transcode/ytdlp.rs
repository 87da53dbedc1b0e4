//! yt-dlp + ffmpeg transcoder implementation.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use super::error::TranscodeError;
use super::traits::Transcoder;
use super::types::{AudioFormat, TagSet};
use crate::process::{ByteStream, CommandSpec, ProcessRunner, ToolsConfig};

/// Transcoder that drives yt-dlp for extraction and ffmpeg for encoding.
pub struct YtDlpTranscoder {
    runner: ProcessRunner,
    extractor_path: PathBuf,
    transcoder_path: PathBuf,
    format: AudioFormat,
    quality: String,
}

impl YtDlpTranscoder {
    pub fn new(config: &ToolsConfig, format: AudioFormat, quality: impl Into<String>) -> Self {
        Self {
            runner: ProcessRunner::from_config(config),
            extractor_path: config.extractor_path.clone(),
            transcoder_path: config.transcoder_path.clone(),
            format,
            quality: quality.into(),
        }
    }

    /// Output template that makes yt-dlp land exactly on `working_path`
    /// once post-processing has swapped in the target extension.
    fn output_template(working_path: &Path) -> PathBuf {
        working_path.with_extension("%(ext)s")
    }

    fn materialize_command(&self, source_url: &str, working_path: &Path) -> CommandSpec {
        let template = Self::output_template(working_path)
            .to_string_lossy()
            .into_owned();
        let mut spec = CommandSpec::new(&self.extractor_path).args([
            "--extract-audio",
            "--audio-format",
            self.format.extractor_name(),
            "--audio-quality",
            self.quality.as_str(),
            "--output",
            template.as_str(),
            "--no-playlist",
            "--no-mtime",
            "--no-warnings",
            "--no-progress",
        ]);
        // A bare program name is resolved through PATH by yt-dlp itself.
        if self.transcoder_path.components().count() > 1 {
            spec = spec
                .arg("--ffmpeg-location")
                .arg(self.transcoder_path.to_string_lossy());
        }
        spec.arg(source_url)
    }

    fn extract_command(&self, source_url: &str) -> CommandSpec {
        CommandSpec::new(&self.extractor_path).args([
            "-f",
            "bestaudio",
            "--no-playlist",
            "--no-warnings",
            "--no-progress",
            "--quiet",
            "-o",
            "-",
            source_url,
        ])
    }

    fn encode_command(&self) -> CommandSpec {
        CommandSpec::new(&self.transcoder_path)
            .args(["-hide_banner", "-loglevel", "error", "-i", "pipe:0", "-vn"])
            .args(["-c:a", self.format.ffmpeg_codec()])
            .args(self.quality_args())
            .args(["-f", self.format.stream_muxer(), "pipe:1"])
    }

    /// Encoder quality flags: a 0-9 VBR level for MP3, or a bitrate such as `192K`.
    fn quality_args(&self) -> Vec<String> {
        let quality = self.quality.trim();
        if self.format.is_lossless() || quality.is_empty() {
            return Vec::new();
        }
        if quality.ends_with(['k', 'K']) {
            return vec!["-b:a".to_string(), quality.to_string()];
        }
        match (self.format, quality.parse::<u8>()) {
            (AudioFormat::Mp3, Ok(level)) if level <= 9 => {
                vec!["-q:a".to_string(), level.to_string()]
            }
            _ => Vec::new(),
        }
    }

    /// Temporary file the tagger writes next to `path`.
    fn tagging_path(&self, path: &Path) -> PathBuf {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!("{}.tagging.{}", stem, self.format.extension()))
    }

    fn tag_command(&self, input: &Path, output: &Path, tags: &TagSet) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.transcoder_path)
            .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
            .arg(input.to_string_lossy())
            .args(["-map", "0", "-c", "copy"]);
        if self.format == AudioFormat::Mp3 {
            spec = spec.args(["-id3v2_version", "3"]);
        }
        spec.args(tags.to_ffmpeg_args()).arg(output.to_string_lossy())
    }
}

#[async_trait]
impl Transcoder for YtDlpTranscoder {
    fn name(&self) -> &str {
        "yt-dlp+ffmpeg"
    }

    fn format(&self) -> AudioFormat {
        self.format
    }

    async fn materialize(
        &self,
        source_url: &str,
        working_path: &Path,
    ) -> Result<(), TranscodeError> {
        let result = self
            .runner
            .run(&self.materialize_command(source_url, working_path))
            .await?;

        if fs::metadata(working_path).await.is_err() {
            return Err(TranscodeError::OutputMissing {
                path: working_path.to_path_buf(),
            });
        }

        debug!(
            path = %working_path.display(),
            duration_ms = result.duration_ms,
            "Materialized audio"
        );
        Ok(())
    }

    fn stream(&self, source_url: &str, buffer_chunks: usize) -> Result<ByteStream, TranscodeError> {
        let stages = [self.extract_command(source_url), self.encode_command()];
        Ok(self.runner.run_piped(&stages, buffer_chunks)?)
    }

    async fn tag(&self, path: &Path, tags: &TagSet) -> Result<(), TranscodeError> {
        if tags.is_empty() {
            return Ok(());
        }

        let tagged = self.tagging_path(path);
        if let Err(e) = self.runner.run(&self.tag_command(path, &tagged, tags)).await {
            if let Err(remove_err) = fs::remove_file(&tagged).await {
                if remove_err.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %tagged.display(), error = %remove_err, "Failed to remove tagging output");
                }
            }
            return Err(e.into());
        }

        fs::rename(&tagged, path).await?;
        Ok(())
    }

    async fn validate(&self) -> Result<(), TranscodeError> {
        self.runner
            .run(&CommandSpec::new(&self.extractor_path).arg("--version"))
            .await?;
        self.runner
            .run(&CommandSpec::new(&self.transcoder_path).arg("-version"))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcoder(format: AudioFormat, quality: &str) -> YtDlpTranscoder {
        YtDlpTranscoder::new(&ToolsConfig::default(), format, quality)
    }

    #[test]
    fn test_output_template() {
        let template = YtDlpTranscoder::output_template(Path::new("/out/abc.partial.mp3"));
        assert_eq!(template, PathBuf::from("/out/abc.partial.%(ext)s"));
    }

    #[test]
    fn test_materialize_command() {
        let t = transcoder(AudioFormat::Mp3, "0");
        let spec = t.materialize_command("https://youtu.be/x", Path::new("/out/id.partial.mp3"));
        assert_eq!(spec.label(), "yt-dlp");
        assert!(spec.has_arg("--extract-audio"));
        assert!(spec.has_arg("mp3"));
        assert!(spec.has_arg("/out/id.partial.%(ext)s"));
        assert!(spec.has_arg("--no-mtime"));
        assert!(!spec.has_arg("--ffmpeg-location"));
        assert_eq!(spec.args.last().map(String::as_str), Some("https://youtu.be/x"));

        let config = ToolsConfig::with_paths(
            PathBuf::from("/usr/bin/yt-dlp"),
            PathBuf::from("/opt/ffmpeg/bin/ffmpeg"),
        );
        let t = YtDlpTranscoder::new(&config, AudioFormat::Mp3, "0");
        let spec = t.materialize_command("https://youtu.be/x", Path::new("/out/id.partial.mp3"));
        assert!(spec.has_arg("--ffmpeg-location"));
        assert!(spec.has_arg("/opt/ffmpeg/bin/ffmpeg"));
    }

    #[test]
    fn test_stream_commands() {
        let t = transcoder(AudioFormat::Opus, "128K");
        let extract = t.extract_command("https://youtu.be/x");
        assert!(extract.has_arg("bestaudio"));
        assert!(extract.has_arg("-"));

        let encode = t.encode_command();
        assert_eq!(encode.label(), "ffmpeg");
        assert!(encode.has_arg("pipe:0"));
        assert!(encode.has_arg("libopus"));
        assert!(encode.has_arg("ogg"));
        assert!(encode.has_arg("-b:a"));
        assert_eq!(encode.args.last().map(String::as_str), Some("pipe:1"));
    }

    #[test]
    fn test_quality_args() {
        assert_eq!(transcoder(AudioFormat::Mp3, "0").quality_args(), vec!["-q:a", "0"]);
        assert_eq!(transcoder(AudioFormat::Mp3, "192K").quality_args(), vec!["-b:a", "192K"]);
        assert!(transcoder(AudioFormat::Mp3, "42").quality_args().is_empty());
        assert!(transcoder(AudioFormat::Flac, "0").quality_args().is_empty());
        assert!(transcoder(AudioFormat::Opus, "5").quality_args().is_empty());
    }

    #[test]
    fn test_tag_command_writes_next_to_input() {
        let t = transcoder(AudioFormat::Mp3, "0");
        let input = Path::new("/out/id.partial.mp3");
        let tagged = t.tagging_path(input);
        assert_eq!(tagged, PathBuf::from("/out/id.partial.tagging.mp3"));

        let tags = TagSet {
            title: Some("Song".to_string()),
            ..Default::default()
        };
        let spec = t.tag_command(input, &tagged, &tags);
        assert!(spec.has_arg("copy"));
        assert!(spec.has_arg("-id3v2_version"));
        assert!(spec.has_arg("title=Song"));
        assert_eq!(
            spec.args.last().map(String::as_str),
            Some("/out/id.partial.tagging.mp3")
        );
    }
}
