//! Media file probing using ffprobe.
//!
//! Parses ffprobe's JSON output into typed container and stream
//! information, and performs the stream-copy feasibility check used to
//! decide between `-c copy` and re-encoding.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::StreamKind;

use super::runner::{run_bounded, Toolchain};

/// Deadline for an ffprobe run.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline for the half-second copy test.
const COPY_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from probing operations.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    #[error("{tool} exited with code {exit_code}: {message}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    #[error("Failed to parse probe output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for probing operations.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Container-level information about a media file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MediaInfo {
    /// Path to the probed file.
    pub path: PathBuf,
    /// Container format name (e.g. "matroska,webm").
    pub container: String,
    /// Total duration in seconds, if known.
    pub duration_secs: Option<f64>,
    /// File size in bytes, if reported.
    pub size_bytes: Option<u64>,
    /// Overall bit rate in bits/second, if reported.
    pub bit_rate: Option<u64>,
    /// All streams in the file.
    pub streams: Vec<StreamInfo>,
}

impl MediaInfo {
    /// First stream of the given kind, if any.
    pub fn first_stream(&self, kind: StreamKind) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.kind == Some(kind))
    }

    /// Whether the file has at least one video stream.
    pub fn has_video(&self) -> bool {
        self.first_stream(StreamKind::Video).is_some()
    }

    /// Whether the file has at least one audio stream.
    pub fn has_audio(&self) -> bool {
        self.first_stream(StreamKind::Audio).is_some()
    }
}

/// Per-stream information from ffprobe.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StreamInfo {
    /// Stream index (ffprobe ordering).
    pub index: usize,
    /// Stream kind, if recognized.
    pub kind: Option<StreamKind>,
    /// Codec name (e.g. "hevc", "aac").
    pub codec_name: String,
    /// Codec profile (e.g. "Main 10", "LC").
    pub profile: Option<String>,
    /// Bit rate in bits/second.
    pub bit_rate: Option<u64>,
    /// Video width.
    pub width: Option<u32>,
    /// Video height.
    pub height: Option<u32>,
    /// Frame rate, parsed from ffprobe's rational form.
    pub fps: Option<f64>,
    /// Sample rate for audio.
    pub sample_rate: Option<u32>,
    /// Number of audio channels.
    pub channels: Option<u8>,
    /// Channel layout string.
    pub channel_layout: Option<String>,
}

/// PCM codec names that cannot be stream-copied into lossy containers.
const PCM_CODECS: &[&str] = &[
    "pcm_s16le", "pcm_s24le", "pcm_s32le", "pcm_f32le", "pcm_f64le", "pcm_u8", "pcm_s16be",
    "pcm_s24be",
];

/// Output formats that require compressed audio.
const COMPRESSED_AUDIO_FORMATS: &[&str] = &[
    "mp3", "aac", "m4a", "ogg", "opus", "wma", "ac3", "dts", "ape", "tta",
];

/// Stderr patterns that indicate a stream copy will not work.
const COPY_ERROR_PATTERNS: &[&str] = &[
    "invalid",
    "incompatible",
    "codec not currently supported",
    "bitstream filter",
    "malformed",
    "could not write header",
];

impl Toolchain {
    /// Probe a media file for container and stream information.
    pub fn probe(&self, path: &Path) -> ProbeResult<MediaInfo> {
        if !path.exists() {
            return Err(ProbeError::FileNotFound(path.to_path_buf()));
        }

        let ffprobe = self
            .ffprobe
            .as_ref()
            .ok_or_else(|| ProbeError::ProbeFailed("ffprobe not available".to_string()))?;

        tracing::debug!(file = %path.display(), "probing");

        let mut cmd = Command::new(ffprobe);
        cmd.args([
            "-hide_banner",
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path);

        let output = run_bounded(cmd, PROBE_TIMEOUT)
            .map_err(|e| ProbeError::ProbeFailed(format!("Failed to run ffprobe: {}", e)))?;

        let Some(status) = output.status else {
            return Err(ProbeError::ProbeFailed(format!(
                "ffprobe did not finish within {}s",
                PROBE_TIMEOUT.as_secs()
            )));
        };

        if !status.success() {
            return Err(ProbeError::CommandFailed {
                tool: "ffprobe".to_string(),
                exit_code: status.code().unwrap_or(-1),
                message: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        let json: Value = serde_json::from_slice(&output.stdout)?;
        Ok(parse_media_info(&json, path))
    }

    /// Check whether a stream can be copied (`-c copy`) into the target
    /// format without re-encoding.
    ///
    /// Works for any codec by attempting a short test conversion after
    /// filtering out known-impossible combinations. Returns the copy
    /// verdict and the stream's codec name.
    pub fn can_copy_stream(
        &self,
        input: &Path,
        output_format: &str,
        kind: StreamKind,
    ) -> ProbeResult<(bool, Option<String>)> {
        let info = self.probe(input)?;

        let Some(stream) = info.first_stream(kind) else {
            return Ok((false, None));
        };

        let codec_name = stream.codec_name.to_ascii_lowercase();

        // Raw PCM cannot be copied into compressed audio containers
        if kind == StreamKind::Audio
            && PCM_CODECS.contains(&codec_name.as_str())
            && COMPRESSED_AUDIO_FORMATS.contains(&output_format.to_ascii_lowercase().as_str())
        {
            tracing::debug!(codec = %codec_name, format = output_format, "PCM copy rejected");
            return Ok((false, Some(codec_name)));
        }

        let can_copy = self.test_copy(input, output_format)?;
        Ok((can_copy, Some(codec_name)))
    }

    /// Run a half-second copy conversion to null output and classify
    /// the result.
    fn test_copy(&self, input: &Path, output_format: &str) -> ProbeResult<bool> {
        let input_str = input.to_string_lossy();
        let args = [
            "-v",
            "error",
            "-i",
            input_str.as_ref(),
            "-t",
            "0.5",
            "-c",
            "copy",
            "-f",
            output_format,
            "-",
        ];

        let run = self
            .run_quiet(&args, COPY_TEST_TIMEOUT)
            .map_err(|e| ProbeError::ProbeFailed(format!("Copy test failed: {}", e)))?;

        if run.success {
            tracing::debug!(format = output_format, "copy test passed");
            return Ok(true);
        }
        if run.timed_out {
            tracing::debug!(format = output_format, "copy test killed at deadline");
            return Ok(false);
        }

        let lowered = run.stderr.to_ascii_lowercase();
        for pattern in COPY_ERROR_PATTERNS {
            if lowered.contains(pattern) {
                tracing::debug!(format = output_format, "copy not possible: {}", pattern);
                return Ok(false);
            }
        }

        // Non-critical error; copy may still work in a full run
        Ok(true)
    }
}

/// Parse ffprobe's JSON document into [`MediaInfo`].
fn parse_media_info(json: &Value, path: &Path) -> MediaInfo {
    let mut info = MediaInfo {
        path: path.to_path_buf(),
        ..Default::default()
    };

    if let Some(format) = json.get("format") {
        info.container = format
            .get("format_name")
            .and_then(|f| f.as_str())
            .unwrap_or("unknown")
            .to_string();

        info.duration_secs = format
            .get("duration")
            .and_then(|d| d.as_str())
            .and_then(|s| s.parse().ok());

        info.size_bytes = format
            .get("size")
            .and_then(|s| s.as_str())
            .and_then(|s| s.parse().ok());

        info.bit_rate = format
            .get("bit_rate")
            .and_then(|b| b.as_str())
            .and_then(|s| s.parse().ok());
    }

    if let Some(streams) = json.get("streams").and_then(|s| s.as_array()) {
        for stream in streams {
            info.streams.push(parse_stream_info(stream));
        }
    }

    info
}

/// Parse a single stream entry.
fn parse_stream_info(stream: &Value) -> StreamInfo {
    StreamInfo {
        index: stream.get("index").and_then(|i| i.as_u64()).unwrap_or(0) as usize,
        kind: stream
            .get("codec_type")
            .and_then(|t| t.as_str())
            .and_then(StreamKind::from_codec_type),
        codec_name: stream
            .get("codec_name")
            .and_then(|c| c.as_str())
            .unwrap_or("")
            .to_string(),
        profile: stream
            .get("profile")
            .and_then(|p| p.as_str())
            .map(|s| s.to_string()),
        bit_rate: stream
            .get("bit_rate")
            .and_then(|b| b.as_str())
            .and_then(|s| s.parse().ok()),
        width: stream
            .get("width")
            .and_then(|w| w.as_u64())
            .map(|w| w as u32),
        height: stream
            .get("height")
            .and_then(|h| h.as_u64())
            .map(|h| h as u32),
        fps: stream
            .get("r_frame_rate")
            .and_then(|r| r.as_str())
            .and_then(parse_frame_rate),
        sample_rate: stream
            .get("sample_rate")
            .and_then(|s| s.as_str())
            .and_then(|s| s.parse().ok()),
        channels: stream
            .get("channels")
            .and_then(|c| c.as_u64())
            .map(|c| c as u8),
        channel_layout: stream
            .get("channel_layout")
            .and_then(|l| l.as_str())
            .map(|s| s.to_string()),
    }
}

/// Parse frame rate string like "24000/1001" into a float.
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let parts: Vec<&str> = rate.split('/').collect();
    if parts.len() == 2 {
        let num: f64 = parts[0].parse().ok()?;
        let den: f64 = parts[1].parse().ok()?;
        if den != 0.0 {
            return Some(num / den);
        }
    }
    rate.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_nonexistent_file() {
        let toolchain = Toolchain::with_paths("ffmpeg", Some(PathBuf::from("ffprobe")));
        let result = toolchain.probe(Path::new("/nonexistent/file.mkv"));
        assert!(matches!(result, Err(ProbeError::FileNotFound(_))));
    }

    #[test]
    fn parse_frame_rate_rational() {
        assert_eq!(parse_frame_rate("24000/1001"), Some(24000.0 / 1001.0));
        assert_eq!(parse_frame_rate("25/1"), Some(25.0));
        assert_eq!(parse_frame_rate("30"), Some(30.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("garbage"), None);
    }

    #[test]
    fn parses_ffprobe_json() {
        let json: Value = serde_json::from_str(
            r#"{
                "format": {
                    "format_name": "matroska,webm",
                    "duration": "120.5",
                    "size": "1048576",
                    "bit_rate": "800000"
                },
                "streams": [
                    {
                        "index": 0,
                        "codec_type": "video",
                        "codec_name": "h264",
                        "profile": "High",
                        "width": 1920,
                        "height": 1080,
                        "r_frame_rate": "24000/1001"
                    },
                    {
                        "index": 1,
                        "codec_type": "audio",
                        "codec_name": "aac",
                        "sample_rate": "48000",
                        "channels": 2,
                        "channel_layout": "stereo"
                    }
                ]
            }"#,
        )
        .unwrap();

        let info = parse_media_info(&json, Path::new("test.mkv"));
        assert_eq!(info.container, "matroska,webm");
        assert_eq!(info.duration_secs, Some(120.5));
        assert_eq!(info.size_bytes, Some(1_048_576));
        assert_eq!(info.streams.len(), 2);
        assert!(info.has_video());
        assert!(info.has_audio());

        let video = info.first_stream(StreamKind::Video).unwrap();
        assert_eq!(video.codec_name, "h264");
        assert_eq!(video.width, Some(1920));
        assert!(video.fps.unwrap() > 23.9 && video.fps.unwrap() < 24.0);

        let audio = info.first_stream(StreamKind::Audio).unwrap();
        assert_eq!(audio.codec_name, "aac");
        assert_eq!(audio.sample_rate, Some(48000));
        assert_eq!(audio.channels, Some(2));
    }

    #[test]
    fn parses_streamless_json() {
        let json: Value = serde_json::from_str("{}").unwrap();
        let info = parse_media_info(&json, Path::new("empty.bin"));
        assert!(info.streams.is_empty());
        assert!(!info.has_video());
        assert_eq!(info.duration_secs, None);
    }
}
