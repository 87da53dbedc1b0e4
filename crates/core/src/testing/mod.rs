//! Testing utilities and mock implementations.
//!
//! The mocks stand in for the external tools so the pipeline can be driven
//! end to end without yt-dlp or ffmpeg installed. `fixtures` goes one level
//! lower and writes fake tool executables, for tests that exercise the real
//! process plumbing.
//!
//! # Example
//!
//! ```rust,ignore
//! use audiograb_core::testing::{MockResolver, MockTranscoder};
//!
//! let resolver = MockResolver::new();
//! let transcoder = MockTranscoder::new();
//!
//! // Configure mock responses
//! resolver.set_delay(Duration::from_millis(50));
//! transcoder.set_produce_output(false);
//!
//! // Hand both to PipelineCoordinator::new...
//! ```

mod mock_resolver;
mod mock_transcoder;

pub use mock_resolver::MockResolver;
pub use mock_transcoder::{MockStreamPlan, MockTranscoder};

/// Fake tool executables and helpers for process-level tests.
#[cfg(unix)]
pub mod fixtures {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    use crate::process::ToolsConfig;

    /// Behavior of the fake extractor.
    #[derive(Debug, Clone)]
    pub struct FakeExtractor {
        pub title: String,
        pub uploader: String,
        pub filesize_approx: Option<u64>,
        /// Bytes written to the output file, or to stdout when streaming.
        pub payload: String,
        /// Stream forever instead of writing the payload once.
        pub endless: bool,
        /// Exit with this code and message instead of producing output.
        pub failure: Option<(i32, String)>,
        /// Seconds to sleep before doing anything.
        pub delay_secs: f64,
    }

    impl Default for FakeExtractor {
        fn default() -> Self {
            Self {
                title: "Fake Title".to_string(),
                uploader: "Fake Uploader".to_string(),
                filesize_approx: Some(5 * 1024 * 1024),
                payload: "fake-audio-bytes".to_string(),
                endless: false,
                failure: None,
                delay_secs: 0.0,
            }
        }
    }

    impl FakeExtractor {
        fn script(&self) -> String {
            let size = self
                .filesize_approx
                .map(|s| s.to_string())
                .unwrap_or_else(|| "NA".to_string());
            let failure = match &self.failure {
                Some((code, message)) => format!(
                    "echo {} >&2\nexit {}\n",
                    shell_quote(message),
                    code
                ),
                None => String::new(),
            };
            let stream = if self.endless {
                format!(
                    "while :; do printf '%s' {}; sleep 0.02; done\n",
                    shell_quote(&self.payload)
                )
            } else {
                format!("printf '%s' {}\n", shell_quote(&self.payload))
            };
            let json = format!(
                r#"{{"title": "{}", "uploader": "{}", "duration": 212.0, "filesize_approx": {}}}"#,
                self.title,
                self.uploader,
                self.filesize_approx
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "null".to_string()),
            );

            format!(
                r#"#!/bin/sh
for arg in "$@"; do
  if [ "$arg" = "--version" ]; then echo 2024.01.01; exit 0; fi
done
sleep {delay}
{failure}mode=download
out=""
fmt=mp3
prev=""
for arg in "$@"; do
  case "$prev" in
    --output|-o) out="$arg" ;;
    --audio-format) fmt="$arg" ;;
  esac
  case "$arg" in
    --dump-json) mode=probe ;;
    --print) mode=size ;;
  esac
  prev="$arg"
done
case "$mode" in
  probe) echo {json}; exit 0 ;;
  size) echo {size}; exit 0 ;;
esac
if [ "$out" = "-" ]; then
  {stream}  exit 0
fi
file=$(printf '%s' "$out" | sed "s/%(ext)s/$fmt/")
printf '%s' {payload} > "$file"
"#,
                delay = self.delay_secs,
                failure = failure,
                json = shell_quote(&json),
                size = size,
                stream = stream,
                payload = shell_quote(&self.payload),
            )
        }
    }

    /// Fake encoder: copies stdin to stdout, or input to output when tagging.
    fn encoder_script(fail_tagging: bool) -> String {
        let tag_step = if fail_tagging {
            "echo 'tagging failed' >&2\nexit 1\n"
        } else {
            "cp \"$in\" \"$last\"\n"
        };
        format!(
            r#"#!/bin/sh
in=""
prev=""
last=""
for arg in "$@"; do
  if [ "$arg" = "-version" ]; then echo "ffmpeg version 6.0"; exit 0; fi
  if [ "$prev" = "-i" ]; then in="$arg"; fi
  prev="$arg"
  last="$arg"
done
if [ "$in" = "pipe:0" ]; then
  exec cat
fi
{tag_step}"#
        )
    }

    fn shell_quote(value: &str) -> String {
        format!("'{}'", value.replace('\'', r"'\''"))
    }

    fn write_executable(path: &Path, body: &str) -> std::io::Result<()> {
        std::fs::write(path, body)?;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
    }

    /// Writes a fake `yt-dlp` into `dir` and returns its path.
    pub fn fake_extractor(dir: &Path, behavior: &FakeExtractor) -> std::io::Result<PathBuf> {
        let path = dir.join("yt-dlp");
        write_executable(&path, &behavior.script())?;
        Ok(path)
    }

    /// Writes a fake `ffmpeg` into `dir` and returns its path.
    pub fn fake_encoder(dir: &Path, fail_tagging: bool) -> std::io::Result<PathBuf> {
        let path = dir.join("ffmpeg");
        write_executable(&path, &encoder_script(fail_tagging))?;
        Ok(path)
    }

    /// Tools configuration pointing at freshly written fakes in `dir`.
    pub fn tools_config(dir: &Path, behavior: &FakeExtractor) -> std::io::Result<ToolsConfig> {
        let extractor = fake_extractor(dir, behavior)?;
        let encoder = fake_encoder(dir, false)?;
        Ok(ToolsConfig::with_paths(extractor, encoder).with_timeout(10))
    }
}
