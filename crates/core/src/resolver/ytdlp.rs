//! yt-dlp backed metadata resolver.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

use super::error::ResolveError;
use super::traits::MetadataResolver;
use super::types::{Metadata, SizeEstimate, UNKNOWN};
use crate::process::{CommandSpec, ProcessRunner, ToolsConfig};
use crate::transcode::AudioFormat;

/// Resolver that runs the extractor in `--dump-json` mode.
pub struct YtDlpResolver {
    runner: ProcessRunner,
    extractor_path: PathBuf,
    audio_format: AudioFormat,
}

/// Fields we read from the extractor's JSON document. Everything else is ignored.
#[derive(Debug, Default, Deserialize)]
struct ProbeDocument {
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    artist: Option<String>,
    filesize_approx: Option<f64>,
    filesize: Option<f64>,
    duration: Option<f64>,
}

impl YtDlpResolver {
    pub fn new(config: &ToolsConfig, audio_format: AudioFormat) -> Self {
        Self {
            runner: ProcessRunner::from_config(config),
            extractor_path: config.extractor_path.clone(),
            audio_format,
        }
    }

    fn probe_command(&self, source_url: &str) -> CommandSpec {
        CommandSpec::new(&self.extractor_path).args([
            "--dump-json",
            "--no-playlist",
            "--no-warnings",
            source_url,
        ])
    }

    fn size_command(&self, source_url: &str) -> CommandSpec {
        CommandSpec::new(&self.extractor_path).args([
            "--print",
            "filesize_approx",
            "--no-playlist",
            "--no-warnings",
            "--extract-audio",
            "--audio-format",
            self.audio_format.extractor_name(),
            source_url,
        ])
    }

    /// Parses the first JSON object in the extractor output.
    pub(crate) fn parse_probe_output(stdout: &str) -> Metadata {
        let document = stdout
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with('{'))
            .find_map(|line| serde_json::from_str::<ProbeDocument>(line).ok());

        let Some(doc) = document else {
            return Metadata::unknown();
        };

        let author = [doc.uploader, doc.channel, doc.artist]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty());

        Metadata {
            title: doc
                .title
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            author: author.unwrap_or_else(|| UNKNOWN.to_string()),
            approx_size_bytes: doc.filesize_approx.or(doc.filesize).and_then(to_bytes),
            duration_secs: doc.duration.filter(|d| d.is_finite() && *d >= 0.0),
        }
    }

    /// Parses `--print filesize_approx` output. `NA` and garbage mean unknown.
    pub(crate) fn parse_size_output(stdout: &str) -> Option<u64> {
        let line = stdout.lines().map(str::trim).find(|l| !l.is_empty())?;
        line.parse::<u64>()
            .ok()
            .or_else(|| line.parse::<f64>().ok().and_then(to_bytes))
    }
}

fn to_bytes(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 0.0).then_some(value as u64)
}

#[async_trait]
impl MetadataResolver for YtDlpResolver {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn probe(&self, source_url: &str) -> Result<Metadata, ResolveError> {
        let result = self.runner.run(&self.probe_command(source_url)).await?;
        let metadata = Self::parse_probe_output(result.stdout());
        debug!(
            url = %source_url,
            title = %metadata.title,
            size = ?metadata.approx_size_bytes,
            "Probed source"
        );
        Ok(metadata)
    }

    async fn probe_size(&self, source_url: &str) -> Result<SizeEstimate, ResolveError> {
        let result = self.runner.run(&self.size_command(source_url)).await?;
        Ok(SizeEstimate::from_bytes(Self::parse_size_output(
            result.stdout(),
        )))
    }
}
