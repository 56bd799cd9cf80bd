//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Defaults mirror the values a fresh install should start with; every
//! field is serde-defaulted so partial files load cleanly.

use serde::{Deserialize, Serialize};

use crate::models::{CodecChoice, HwaccelChoice};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Audio conversion defaults.
    #[serde(default)]
    pub audio: AudioSettings,

    /// Video conversion defaults.
    #[serde(default)]
    pub video: VideoSettings,

    /// Advanced knobs.
    #[serde(default)]
    pub advanced: AdvancedSettings,
}

/// Path configuration for output, work, and log directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Default output folder for converted files.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Folder for the persisted job queue and scratch files.
    #[serde(default = "default_work_dir")]
    pub work_dir: String,

    /// Folder for per-job log files.
    #[serde(default = "default_logs_dir")]
    pub logs_dir: String,
}

fn default_output_dir() -> String {
    "converted".to_string()
}

fn default_work_dir() -> String {
    ".muxolotl".to_string()
}

fn default_logs_dir() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            work_dir: default_work_dir(),
            logs_dir: default_logs_dir(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Use compact log format (progress filtering, no tool output lines).
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Prefix log lines with timestamps.
    #[serde(default = "default_true")]
    pub show_timestamps: bool,

    /// Progress update step percentage in compact mode.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    /// Number of tool output lines kept for error diagnosis.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,
}

fn default_true() -> bool {
    true
}

fn default_progress_step() -> u32 {
    20
}

fn default_error_tail() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            compact: true,
            show_timestamps: true,
            progress_step: default_progress_step(),
            error_tail: default_error_tail(),
        }
    }
}

/// Audio conversion defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Default output format extension.
    #[serde(default = "default_audio_format")]
    pub default_format: String,

    /// Default codec selection.
    #[serde(default)]
    pub default_codec: CodecChoice,

    /// Default audio bitrate.
    #[serde(default = "default_audio_bitrate")]
    pub default_bitrate: String,

    /// Default sample rate in Hz.
    #[serde(default = "default_sample_rate")]
    pub default_sample_rate: u32,

    /// Default channel count.
    #[serde(default = "default_channels")]
    pub default_channels: u8,
}

fn default_audio_format() -> String {
    "mp3".to_string()
}

fn default_audio_bitrate() -> String {
    "192k".to_string()
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_channels() -> u8 {
    2
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            default_format: default_audio_format(),
            default_codec: CodecChoice::Auto,
            default_bitrate: default_audio_bitrate(),
            default_sample_rate: default_sample_rate(),
            default_channels: default_channels(),
        }
    }
}

/// Video conversion defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSettings {
    /// Default output format extension.
    #[serde(default = "default_video_format")]
    pub default_format: String,

    /// Default video codec selection.
    #[serde(default = "default_video_codec")]
    pub default_video_codec: CodecChoice,

    /// Default audio codec selection.
    #[serde(default = "default_video_audio_codec")]
    pub default_audio_codec: CodecChoice,

    /// Default encoder preset.
    #[serde(default = "default_preset")]
    pub default_preset: String,

    /// Default CRF value.
    #[serde(default = "default_crf")]
    pub default_crf: u8,

    /// Default audio bitrate.
    #[serde(default = "default_audio_bitrate")]
    pub default_audio_bitrate: String,
}

fn default_video_format() -> String {
    "mp4".to_string()
}

fn default_video_codec() -> CodecChoice {
    CodecChoice::Named("libx264".to_string())
}

fn default_video_audio_codec() -> CodecChoice {
    CodecChoice::Named("aac".to_string())
}

fn default_preset() -> String {
    "medium".to_string()
}

fn default_crf() -> u8 {
    23
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            default_format: default_video_format(),
            default_video_codec: default_video_codec(),
            default_audio_codec: default_video_audio_codec(),
            default_preset: default_preset(),
            default_crf: default_crf(),
            default_audio_bitrate: default_audio_bitrate(),
        }
    }
}

/// Advanced knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedSettings {
    /// Hardware decode acceleration selection.
    #[serde(default)]
    pub hardware_acceleration: HwaccelChoice,

    /// Encoder thread count. `None` lets FFmpeg decide.
    #[serde(default)]
    pub thread_count: Option<u32>,

    /// Overwrite existing output files.
    #[serde(default = "default_true")]
    pub overwrite_files: bool,

    /// Preserve input metadata in the output.
    #[serde(default = "default_true")]
    pub preserve_metadata: bool,
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            hardware_acceleration: HwaccelChoice::Auto,
            thread_count: None,
            overwrite_files: true,
            preserve_metadata: true,
        }
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Paths,
    Logging,
    Audio,
    Video,
    Advanced,
}

impl ConfigSection {
    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Audio => "audio",
            ConfigSection::Video => "video",
            ConfigSection::Advanced => "advanced",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_serializes() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        assert!(toml.contains("[paths]"));
        assert!(toml.contains("[audio]"));
        assert!(toml.contains("output_dir"));
    }

    #[test]
    fn settings_round_trip() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.paths.output_dir, settings.paths.output_dir);
        assert_eq!(parsed.video.default_crf, settings.video.default_crf);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let minimal = "[paths]\noutput_dir = \"custom_output\"";
        let parsed: Settings = toml::from_str(minimal).unwrap();
        // Custom value preserved
        assert_eq!(parsed.paths.output_dir, "custom_output");
        // Defaults applied for missing
        assert_eq!(parsed.logging.compact, true);
        assert_eq!(parsed.audio.default_bitrate, "192k");
        assert_eq!(parsed.video.default_crf, 23);
    }

    #[test]
    fn named_codec_round_trips_through_toml() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        assert!(toml.contains("libx264"));
        let parsed: Settings = toml::from_str(&toml).unwrap();
        assert_eq!(
            parsed.video.default_video_codec,
            CodecChoice::Named("libx264".to_string())
        );
    }
}
