//! Core enums used throughout the application.

use serde::{Deserialize, Serialize};

/// Kind of media stream, matching ffprobe's `codec_type` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
}

impl StreamKind {
    /// Parse from ffprobe's `codec_type` string.
    pub fn from_codec_type(s: &str) -> Option<Self> {
        match s {
            "video" => Some(StreamKind::Video),
            "audio" => Some(StreamKind::Audio),
            "subtitle" => Some(StreamKind::Subtitle),
            _ => None,
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Video => write!(f, "video"),
            StreamKind::Audio => write!(f, "audio"),
            StreamKind::Subtitle => write!(f, "subtitle"),
        }
    }
}

/// What a conversion job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionMode {
    /// Video file to another video format.
    Video,
    /// Audio file to another audio format.
    Audio,
    /// Audio track extracted out of a video file.
    ExtractAudio,
}

impl std::fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversionMode::Video => write!(f, "video"),
            ConversionMode::Audio => write!(f, "audio"),
            ConversionMode::ExtractAudio => write!(f, "extract-audio"),
        }
    }
}

/// Codec selection for a conversion.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecChoice {
    /// Pick the best available codec for the target format.
    #[default]
    Auto,
    /// Stream-copy without re-encoding.
    Copy,
    /// A specific encoder name (e.g. "libx264", "h264_nvenc").
    #[serde(untagged)]
    Named(String),
}

impl CodecChoice {
    pub fn is_copy(&self) -> bool {
        matches!(self, CodecChoice::Copy)
    }
}

impl std::str::FromStr for CodecChoice {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "auto" => CodecChoice::Auto,
            "copy" => CodecChoice::Copy,
            other => CodecChoice::Named(other.to_string()),
        })
    }
}

impl std::fmt::Display for CodecChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecChoice::Auto => write!(f, "auto"),
            CodecChoice::Copy => write!(f, "copy"),
            CodecChoice::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Hardware decode acceleration selection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HwaccelChoice {
    /// Use the best verified-working method, if any.
    #[default]
    Auto,
    /// Software decoding only.
    None,
    /// A specific method (e.g. "cuda", "vaapi").
    #[serde(untagged)]
    Named(String),
}

impl std::str::FromStr for HwaccelChoice {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "auto" => HwaccelChoice::Auto,
            "none" => HwaccelChoice::None,
            other => HwaccelChoice::Named(other.to_string()),
        })
    }
}

impl std::fmt::Display for HwaccelChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HwaccelChoice::Auto => write!(f, "auto"),
            HwaccelChoice::None => write!(f, "none"),
            HwaccelChoice::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Encoding speed/quality trade-off profile.
///
/// Maps to preset + CRF combinations for software encoders. Never
/// applied when the video codec is `copy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedProfile {
    /// Fastest encode, lower quality.
    UltraFast,
    /// Fast encode.
    Fast,
    /// Default trade-off.
    #[default]
    Balanced,
    /// Slow encode, best quality.
    HighQuality,
}

impl SpeedProfile {
    /// Encoder preset for this profile.
    pub fn preset(&self) -> &'static str {
        match self {
            SpeedProfile::UltraFast => "ultrafast",
            SpeedProfile::Fast => "veryfast",
            SpeedProfile::Balanced => "medium",
            SpeedProfile::HighQuality => "slow",
        }
    }

    /// CRF value for this profile (lower is better quality).
    pub fn crf(&self) -> u8 {
        match self {
            SpeedProfile::UltraFast => 28,
            SpeedProfile::Fast => 26,
            SpeedProfile::Balanced => 23,
            SpeedProfile::HighQuality => 18,
        }
    }

    /// Tune parameter, when the profile calls for one.
    pub fn tune(&self) -> Option<&'static str> {
        match self {
            SpeedProfile::UltraFast => Some("fastdecode"),
            _ => None,
        }
    }
}

impl std::str::FromStr for SpeedProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ultrafast" | "ultra-fast" => Ok(SpeedProfile::UltraFast),
            "fast" => Ok(SpeedProfile::Fast),
            "balanced" => Ok(SpeedProfile::Balanced),
            "high" | "high-quality" => Ok(SpeedProfile::HighQuality),
            other => Err(format!("unknown speed profile: {}", other)),
        }
    }
}

/// Audio quality level for VBR-style encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioQuality {
    Highest,
    High,
    Medium,
    Low,
}

impl std::str::FromStr for AudioQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "highest" => Ok(AudioQuality::Highest),
            "high" => Ok(AudioQuality::High),
            "medium" => Ok(AudioQuality::Medium),
            "low" => Ok(AudioQuality::Low),
            other => Err(format!("unknown quality level: {}", other)),
        }
    }
}

/// Video codec family, used for hardware encoder election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecFamily {
    H264,
    Hevc,
    Vp9,
    Av1,
}

impl CodecFamily {
    pub const ALL: [CodecFamily; 4] = [
        CodecFamily::H264,
        CodecFamily::Hevc,
        CodecFamily::Vp9,
        CodecFamily::Av1,
    ];
}

impl std::fmt::Display for CodecFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecFamily::H264 => write!(f, "h264"),
            CodecFamily::Hevc => write!(f, "hevc"),
            CodecFamily::Vp9 => write!(f, "vp9"),
            CodecFamily::Av1 => write!(f, "av1"),
        }
    }
}

/// GPU vendor detected on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
}

impl std::fmt::Display for GpuVendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuVendor::Nvidia => write!(f, "NVIDIA"),
            GpuVendor::Amd => write!(f, "AMD"),
            GpuVendor::Intel => write!(f, "Intel"),
            GpuVendor::Apple => write!(f, "Apple"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_choice_parses() {
        assert_eq!("auto".parse::<CodecChoice>().unwrap(), CodecChoice::Auto);
        assert_eq!("copy".parse::<CodecChoice>().unwrap(), CodecChoice::Copy);
        assert_eq!(
            "libx264".parse::<CodecChoice>().unwrap(),
            CodecChoice::Named("libx264".to_string())
        );
    }

    #[test]
    fn speed_profile_maps_to_encoder_settings() {
        assert_eq!(SpeedProfile::UltraFast.preset(), "ultrafast");
        assert_eq!(SpeedProfile::UltraFast.crf(), 28);
        assert_eq!(SpeedProfile::UltraFast.tune(), Some("fastdecode"));
        assert_eq!(SpeedProfile::Balanced.preset(), "medium");
        assert_eq!(SpeedProfile::Balanced.crf(), 23);
        assert_eq!(SpeedProfile::HighQuality.tune(), None);
    }

    #[test]
    fn stream_kind_from_probe_output() {
        assert_eq!(StreamKind::from_codec_type("video"), Some(StreamKind::Video));
        assert_eq!(StreamKind::from_codec_type("audio"), Some(StreamKind::Audio));
        assert_eq!(StreamKind::from_codec_type("data"), None);
    }
}
