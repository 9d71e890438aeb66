//! Source media analysis via ffprobe.
//!
//! Collects the stream layout (video presence, audio and subtitle tracks with
//! language and disposition) and the container duration of a media file.

use crate::streams::{normalize_language, StreamDescriptor};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Error type for probe operations.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// ffprobe could not be started.
    #[error("Failed to run ffprobe: {0}")]
    Spawn(#[from] std::io::Error),

    /// ffprobe exited unsuccessfully.
    #[error("ffprobe failed: {0}")]
    Failed(String),

    /// Failed to parse ffprobe JSON output.
    #[error("Failed to parse ffprobe output: {0}")]
    Parse(String),
}

/// Result of analysing a media file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MediaAnalysis {
    /// Container duration in seconds (0 when unknown).
    pub duration_secs: f64,
    /// Whether at least one video stream is present.
    pub has_video: bool,
    /// Audio tracks in input order.
    pub audio_streams: Vec<StreamDescriptor>,
    /// Subtitle tracks in input order.
    pub subtitle_streams: Vec<StreamDescriptor>,
}

/// Something that can analyse a media file.
///
/// The worker uses [`Ffprobe`]; tests substitute canned analyses.
pub trait MediaProber: Send + Sync {
    fn probe(&self, path: &Path) -> Result<MediaAnalysis, ProbeError>;
}

/// [`MediaProber`] backed by the ffprobe binary.
#[derive(Debug, Clone)]
pub struct Ffprobe {
    binary: PathBuf,
}

impl Ffprobe {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for Ffprobe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl MediaProber for Ffprobe {
    /// Runs `ffprobe -v quiet -print_format json -show_format -show_streams <path>`.
    fn probe(&self, path: &Path) -> Result<MediaAnalysis, ProbeError> {
        let output = Command::new(&self.binary)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::Failed(format!(
                "ffprobe exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_ffprobe_output(&stdout)
    }
}

/// Raw ffprobe JSON structures for parsing.
mod ffprobe_json {
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, Deserialize)]
    pub struct FfprobeOutput {
        pub streams: Option<Vec<Stream>>,
        pub format: Option<Format>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Stream {
        pub codec_type: Option<String>,
        #[serde(default)]
        pub tags: HashMap<String, String>,
        #[serde(default)]
        pub disposition: HashMap<String, i64>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Format {
        pub duration: Option<String>,
    }
}

/// Parses ffprobe JSON output into a [`MediaAnalysis`].
///
/// Stream indices are positional per codec type, matching the encoder's
/// `0:a:N` / `0:s:N` selection syntax.
pub fn parse_ffprobe_output(json_str: &str) -> Result<MediaAnalysis, ProbeError> {
    let ffprobe: ffprobe_json::FfprobeOutput =
        serde_json::from_str(json_str).map_err(|e| ProbeError::Parse(e.to_string()))?;

    let mut analysis = MediaAnalysis::default();

    for stream in ffprobe.streams.unwrap_or_default() {
        let flag = |name: &str| stream.disposition.get(name).copied().unwrap_or(0) != 0;
        let language = stream
            .tags
            .get("language")
            .and_then(|tag| normalize_language(Some(tag)));

        match stream.codec_type.as_deref().unwrap_or("") {
            "video" => analysis.has_video = true,
            "audio" => {
                let index = analysis.audio_streams.len();
                analysis.audio_streams.push(StreamDescriptor {
                    index,
                    language,
                    default: flag("default"),
                    original: flag("original"),
                });
            }
            "subtitle" => {
                let index = analysis.subtitle_streams.len();
                analysis.subtitle_streams.push(StreamDescriptor {
                    index,
                    language,
                    default: flag("default"),
                    original: flag("original"),
                });
            }
            _ => {}
        }
    }

    analysis.duration_secs = ffprobe
        .format
        .and_then(|format| format.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(0.0);

    Ok(analysis)
}
