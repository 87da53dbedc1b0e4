//! Types for the transcode module.

use serde::{Deserialize, Serialize};

/// Target audio format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    /// MPEG Audio Layer III
    #[default]
    Mp3,
    /// AAC in an MP4 container
    M4a,
    /// Opus in Ogg
    Opus,
    /// Ogg Vorbis
    Vorbis,
    /// Free Lossless Audio Codec
    Flac,
    /// WAVE (uncompressed)
    Wav,
}

impl AudioFormat {
    /// File extension of finished artifacts.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
            Self::Opus => "opus",
            Self::Vorbis => "ogg",
            Self::Flac => "flac",
            Self::Wav => "wav",
        }
    }

    /// Value for the extractor's `--audio-format` option.
    pub fn extractor_name(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
            Self::Opus => "opus",
            Self::Vorbis => "vorbis",
            Self::Flac => "flac",
            Self::Wav => "wav",
        }
    }

    /// ffmpeg encoder name.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::Mp3 => "libmp3lame",
            Self::M4a => "aac",
            Self::Opus => "libopus",
            Self::Vorbis => "libvorbis",
            Self::Flac => "flac",
            Self::Wav => "pcm_s16le",
        }
    }

    /// ffmpeg muxer usable on a non-seekable pipe.
    ///
    /// MP4 needs a seekable output, so streamed AAC goes out as ADTS.
    pub fn stream_muxer(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::M4a => "adts",
            Self::Opus | Self::Vorbis => "ogg",
            Self::Flac => "flac",
            Self::Wav => "wav",
        }
    }

    /// Content type of a finished file.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::M4a => "audio/mp4",
            Self::Opus | Self::Vorbis => "audio/ogg",
            Self::Flac => "audio/flac",
            Self::Wav => "audio/wav",
        }
    }

    /// Content type of a live stream.
    pub fn stream_mime_type(&self) -> &'static str {
        match self {
            Self::M4a => "audio/aac",
            other => other.mime_type(),
        }
    }

    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Flac | Self::Wav)
    }
}

/// Tags written into a finished file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

impl TagSet {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.artist.is_none() && self.album.is_none() && self.year.is_none()
    }

    /// Convert to ffmpeg metadata arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(ref title) = self.title {
            args.extend(["-metadata".to_string(), format!("title={}", title)]);
        }
        if let Some(ref artist) = self.artist {
            args.extend(["-metadata".to_string(), format!("artist={}", artist)]);
        }
        if let Some(ref album) = self.album {
            args.extend(["-metadata".to_string(), format!("album={}", album)]);
        }
        if let Some(year) = self.year {
            args.extend(["-metadata".to_string(), format!("date={}", year)]);
        }

        args
    }
}
