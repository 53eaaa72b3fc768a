use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::get_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Flac,
    Ogg,
    M4a,
    Opus,
    Wav,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 6] = [
        AudioFormat::Mp3,
        AudioFormat::Flac,
        AudioFormat::Ogg,
        AudioFormat::M4a,
        AudioFormat::Opus,
        AudioFormat::Wav,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Flac => "flac",
            AudioFormat::Ogg => "ogg",
            AudioFormat::M4a => "m4a",
            AudioFormat::Opus => "opus",
            AudioFormat::Wav => "wav",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.as_str() == lower)
            .ok_or_else(|| format!("unsupported audio format: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Bitrate {
    #[serde(rename = "128k")]
    K128,
    #[serde(rename = "192k")]
    K192,
    #[serde(rename = "256k")]
    K256,
    #[default]
    #[serde(rename = "320k")]
    K320,
}

impl Bitrate {
    pub const ALL: [Bitrate; 4] = [Bitrate::K128, Bitrate::K192, Bitrate::K256, Bitrate::K320];

    pub fn as_str(self) -> &'static str {
        match self {
            Bitrate::K128 => "128k",
            Bitrate::K192 => "192k",
            Bitrate::K256 => "256k",
            Bitrate::K320 => "320k",
        }
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bitrate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|bitrate| bitrate.as_str() == lower)
            .ok_or_else(|| format!("unsupported bitrate: {}", s))
    }
}

/// Everything a download job needs. Not modified once the job has started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub source_url: String,
    pub output_directory: PathBuf,
    pub audio_format: AudioFormat,
    pub bitrate: Bitrate,
    pub use_auth: bool,
}

impl DownloadRequest {
    pub fn new(source_url: impl Into<String>, output_directory: impl Into<PathBuf>) -> Self {
        Self {
            source_url: source_url.into(),
            output_directory: output_directory.into(),
            audio_format: AudioFormat::default(),
            bitrate: Bitrate::default(),
            use_auth: true,
        }
    }
}

/// Terminal result of a download job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub success: bool,
    pub message: String,
    pub content_summary: String,
    pub timestamp: String,
}

impl DownloadOutcome {
    pub fn succeeded(content_summary: String) -> Self {
        Self {
            success: true,
            message: "Download completed successfully!".to_string(),
            content_summary,
            timestamp: get_timestamp(),
        }
    }

    pub fn failed(message: String, content_summary: String) -> Self {
        Self {
            success: false,
            message,
            content_summary,
            timestamp: get_timestamp(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackProgress {
    pub current: u32,
    pub total: u32,
}

impl TrackProgress {
    /// Whole percentage in `0..=100`. A total below one counts as one.
    pub fn percent(&self) -> u8 {
        let total = u64::from(self.total.max(1));
        let pct = u64::from(self.current) * 100 / total;
        pct.min(100) as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    Console(String),
    Progress(TrackProgress),
    /// Always the last event of a job.
    Finished(DownloadOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    Idle,
    ResolvingLocalVersion,
    QueryingRemote,
    UpToDate,
    Downloading,
    Replacing,
    Done,
}
