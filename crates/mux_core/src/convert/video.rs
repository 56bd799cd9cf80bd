//! Video file conversion with hardware encoder election.
//!
//! Encoders are elected lazily per codec family: the priority list is
//! walked hardware-first, each candidate checked against the build's
//! encoder listing and then verified with a one-frame test encode. The
//! winner is cached for the converter's lifetime.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::detect::Capabilities;
use crate::ffmpeg::EncodeParams;
use crate::models::{CodecChoice, CodecFamily, HwaccelChoice, SpeedProfile, StreamKind};

use super::audio::{output_path, run_conversion};
use super::tables;
use super::{AudioConvertOptions, AudioConverter, ConvertContext, ConvertError, ConvertResult};

/// Options for a video conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConvertOptions {
    /// Output format extension.
    #[serde(default = "default_video_format")]
    pub format: String,

    /// Video encoder selection.
    #[serde(default)]
    pub video_codec: CodecChoice,

    /// Audio encoder selection.
    #[serde(default)]
    pub audio_codec: CodecChoice,

    /// Video bitrate (e.g. "5M"). `None` means quality-based encoding.
    #[serde(default)]
    pub video_bitrate: Option<String>,

    /// Audio bitrate.
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: Option<String>,

    /// Speed/quality profile supplying preset, CRF, and tune defaults.
    #[serde(default)]
    pub profile: SpeedProfile,

    /// CRF override. Takes precedence over the profile's value.
    #[serde(default)]
    pub crf: Option<u32>,

    /// Preset override.
    #[serde(default)]
    pub preset: Option<String>,

    /// Tune override.
    #[serde(default)]
    pub tune: Option<String>,

    /// Output resolution (e.g. "1920x1080").
    #[serde(default)]
    pub resolution: Option<String>,

    /// Output framerate.
    #[serde(default)]
    pub fps: Option<u32>,

    /// Hardware decode acceleration.
    #[serde(default)]
    pub hwaccel: HwaccelChoice,

    /// Keep input metadata.
    #[serde(default = "default_true")]
    pub preserve_metadata: bool,

    /// Encoder thread count.
    #[serde(default)]
    pub threads: Option<u32>,
}

fn default_video_format() -> String {
    "mp4".to_string()
}

fn default_audio_bitrate() -> Option<String> {
    Some("192k".to_string())
}

fn default_true() -> bool {
    true
}

impl Default for VideoConvertOptions {
    fn default() -> Self {
        Self {
            format: default_video_format(),
            video_codec: CodecChoice::Auto,
            audio_codec: CodecChoice::Auto,
            video_bitrate: None,
            audio_bitrate: default_audio_bitrate(),
            profile: SpeedProfile::default(),
            crf: None,
            preset: None,
            tune: None,
            resolution: None,
            fps: None,
            hwaccel: HwaccelChoice::Auto,
            preserve_metadata: true,
            threads: None,
        }
    }
}

/// Converts video files, electing hardware encoders where available.
pub struct VideoConverter {
    caps: Arc<Capabilities>,
    /// Elected encoder per codec family (None = nothing usable).
    elected: Mutex<HashMap<CodecFamily, Option<String>>>,
}

impl VideoConverter {
    pub fn new(caps: Arc<Capabilities>) -> Self {
        Self {
            caps,
            elected: Mutex::new(HashMap::new()),
        }
    }

    /// Convert a video file into `output_dir`, named after the input
    /// stem with the target extension. Returns the output path.
    pub fn convert(
        &self,
        input: &Path,
        output_dir: &Path,
        opts: &VideoConvertOptions,
        ctx: ConvertContext<'_>,
    ) -> ConvertResult<PathBuf> {
        if !input.exists() {
            return Err(ConvertError::InputNotFound(input.to_path_buf()));
        }

        fs::create_dir_all(output_dir)?;
        let output = output_path(input, output_dir, &opts.format);

        let video_codec = self.resolve_video_codec(&opts.video_codec, &opts.format);
        let audio_codec = self.resolve_audio_codec(&opts.audio_codec, &opts.format);
        let hwaccel = self.resolve_hwaccel(&opts.hwaccel);

        if let Some(logger) = ctx.logger {
            logger.encoder(&video_codec);
            if let Some(method) = &hwaccel {
                logger.info(&format!("Hardware decode: {}", method));
            }
        }

        let mut params = EncodeParams {
            video_codec: Some(video_codec.clone()),
            audio_codec: Some(audio_codec),
            video_bitrate: opts.video_bitrate.clone(),
            audio_bitrate: opts.audio_bitrate.clone(),
            hwaccel,
            preserve_metadata: opts.preserve_metadata,
            threads: opts.threads,
            format: Some(
                tables::video_muxer(&opts.format)
                    .unwrap_or(opts.format.as_str())
                    .to_string(),
            ),
            ..EncodeParams::new()
        };

        // Quality and speed settings apply only when actually encoding
        if video_codec != "copy" {
            let crf = opts.crf.unwrap_or_else(|| u32::from(opts.profile.crf()));
            apply_quality(&mut params, &video_codec, crf);

            params.preset = Some(
                opts.preset
                    .clone()
                    .unwrap_or_else(|| opts.profile.preset().to_string()),
            );
            params.tune = opts
                .tune
                .clone()
                .or_else(|| opts.profile.tune().map(str::to_string));
        }

        if let Some(resolution) = &opts.resolution {
            params.extra_args.push("-s".to_string());
            params.extra_args.push(resolution.clone());
        }
        if let Some(fps) = opts.fps {
            params.extra_args.push("-r".to_string());
            params.extra_args.push(fps.to_string());
        }
        if tables::wants_faststart(&opts.format) {
            params.extra_args.push("-movflags".to_string());
            params.extra_args.push("+faststart".to_string());
        }

        let duration_secs = self.probe_duration(input);
        run_conversion(self.caps.as_ref(), input, &output, &params, duration_secs, ctx)?;

        if !output.exists() {
            return Err(ConvertError::OutputMissing(output));
        }

        tracing::info!(output = %output.display(), "video conversion complete");
        Ok(output)
    }

    /// Extract the audio track of a video file.
    pub fn extract_audio(
        &self,
        input: &Path,
        output_dir: &Path,
        opts: &AudioConvertOptions,
        ctx: ConvertContext<'_>,
    ) -> ConvertResult<PathBuf> {
        if !input.exists() {
            return Err(ConvertError::InputNotFound(input.to_path_buf()));
        }

        fs::create_dir_all(output_dir)?;
        let output = output_path(input, output_dir, &opts.format);

        let audio = AudioConverter::new(Arc::clone(&self.caps));
        let codec = audio.resolve_codec(&opts.codec, &opts.format);
        if let Some(logger) = ctx.logger {
            logger.encoder(&codec);
        }

        let params = EncodeParams {
            audio_codec: Some(codec),
            audio_bitrate: opts.bitrate.clone(),
            sample_rate: opts.sample_rate,
            channels: opts.channels,
            no_video: true,
            preserve_metadata: opts.preserve_metadata,
            format: Some(
                tables::audio_muxer(&opts.format)
                    .unwrap_or(opts.format.as_str())
                    .to_string(),
            ),
            ..EncodeParams::new()
        };

        let duration_secs = self.probe_duration(input);
        run_conversion(self.caps.as_ref(), input, &output, &params, duration_secs, ctx)?;

        if !output.exists() {
            return Err(ConvertError::OutputMissing(output));
        }

        tracing::info!(output = %output.display(), "audio extraction complete");
        Ok(output)
    }

    /// Elected encoder for a codec family, probing on first use.
    pub fn best_encoder(&self, family: CodecFamily) -> Option<String> {
        {
            let elected = self.elected.lock();
            if let Some(cached) = elected.get(&family) {
                return cached.clone();
            }
        }

        let available = self.caps.video_encoders();
        let mut winner = None;

        for &candidate in tables::encoder_priority(family) {
            if available.contains(candidate) && self.caps.test_encoder(candidate) {
                if ["nvenc", "qsv", "amf"].iter().any(|m| candidate.contains(m)) {
                    tracing::info!(encoder = candidate, %family, "hardware encoder elected");
                } else {
                    tracing::debug!(encoder = candidate, %family, "encoder elected");
                }
                winner = Some(candidate.to_string());
                break;
            }
        }

        self.elected.lock().insert(family, winner.clone());
        winner
    }

    /// Human-readable summary of elected encoders.
    pub fn encoder_info(&self) -> String {
        let mut info = Vec::new();

        if let Some(encoder) = self.best_encoder(CodecFamily::H264) {
            let label = if encoder.contains("nvenc") {
                "H.264: NVIDIA GPU"
            } else if encoder.contains("qsv") {
                "H.264: Intel Quick Sync"
            } else if encoder.contains("amf") {
                "H.264: AMD GPU"
            } else if encoder.contains("videotoolbox") {
                "H.264: Apple hardware"
            } else {
                "H.264: CPU"
            };
            info.push(label.to_string());
        }

        if let Some(encoder) = self.best_encoder(CodecFamily::Hevc) {
            if ["nvenc", "qsv", "amf"].iter().any(|m| encoder.contains(m)) {
                info.push("HEVC: hardware accelerated".to_string());
            }
        }

        if info.is_empty() {
            return "CPU encoding only".to_string();
        }
        info.join(" | ")
    }

    /// Resolve a video codec choice for a container.
    fn resolve_video_codec(&self, choice: &CodecChoice, format: &str) -> String {
        match choice {
            CodecChoice::Copy => "copy".to_string(),
            CodecChoice::Named(name) => name.clone(),
            CodecChoice::Auto => {
                let fmt = format.to_ascii_lowercase();

                if tables::H264_CONTAINERS.contains(&fmt.as_str()) {
                    if let Some(encoder) = self.best_encoder(CodecFamily::H264) {
                        return encoder;
                    }
                }
                if fmt == "webm" {
                    if let Some(encoder) = self.best_encoder(CodecFamily::Vp9) {
                        return encoder;
                    }
                }

                let available = self.caps.video_encoders();
                for codec in tables::video_codec_fallbacks(&fmt) {
                    if available.contains(*codec) {
                        return codec.to_string();
                    }
                }
                if available.contains("libx264") {
                    return "libx264".to_string();
                }

                "copy".to_string()
            }
        }
    }

    /// Resolve an audio codec choice for a video container.
    fn resolve_audio_codec(&self, choice: &CodecChoice, format: &str) -> String {
        match choice {
            CodecChoice::Copy => "copy".to_string(),
            CodecChoice::Named(name) => name.clone(),
            CodecChoice::Auto => {
                let available = self.caps.audio_encoders();

                if let Some(recommended) = tables::video_audio_codec(format) {
                    if available.contains(recommended) {
                        return recommended.to_string();
                    }
                }

                for codec in tables::video_audio_fallbacks(format) {
                    if available.contains(*codec) {
                        return codec.to_string();
                    }
                }
                if available.contains("aac") {
                    return "aac".to_string();
                }

                "copy".to_string()
            }
        }
    }

    /// Resolve a hwaccel choice against the working set.
    fn resolve_hwaccel(&self, choice: &HwaccelChoice) -> Option<String> {
        match choice {
            HwaccelChoice::None => None,
            HwaccelChoice::Auto => {
                let working = self.caps.working_hwaccels();
                for &hwaccel in tables::HWACCEL_DECODE_PRIORITY {
                    if working.contains(hwaccel) {
                        tracing::debug!(hwaccel, "using hardware acceleration");
                        return Some(hwaccel.to_string());
                    }
                }
                None
            }
            HwaccelChoice::Named(name) => {
                if self.caps.working_hwaccels().contains(name) {
                    Some(name.clone())
                } else {
                    tracing::warn!(hwaccel = %name, "requested hwaccel not available");
                    None
                }
            }
        }
    }

    fn probe_duration(&self, input: &Path) -> Option<f64> {
        self.caps
            .toolchain()
            .probe(input)
            .ok()
            .and_then(|info| info.duration_secs)
    }

    /// Whether the input's video stream can be stream-copied into the
    /// target format.
    pub fn can_copy_video(&self, input: &Path, format: &str) -> ConvertResult<bool> {
        let muxer = tables::video_muxer(format).unwrap_or(format);
        let (can_copy, _) =
            self.caps
                .toolchain()
                .can_copy_stream(input, muxer, StreamKind::Video)?;
        Ok(can_copy)
    }
}

/// Map the requested CRF onto the elected encoder's quality flag.
///
/// NVENC's cq scale runs opposite to CRF; QSV and AMF take the CRF
/// value directly through their own flags.
fn apply_quality(params: &mut EncodeParams, codec: &str, crf: u32) {
    if codec.contains("nvenc") {
        params.cq = Some(51u32.saturating_sub(crf));
    } else if codec.contains("qsv") || codec.contains("amf") {
        params.cq = Some(crf);
    } else {
        params.crf = Some(crf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_mapping_per_encoder() {
        let mut params = EncodeParams::new();
        apply_quality(&mut params, "h264_nvenc", 23);
        assert_eq!(params.cq, Some(28));
        assert_eq!(params.crf, None);

        let mut params = EncodeParams::new();
        apply_quality(&mut params, "hevc_qsv", 23);
        assert_eq!(params.cq, Some(23));

        let mut params = EncodeParams::new();
        apply_quality(&mut params, "h264_amf", 18);
        assert_eq!(params.cq, Some(18));

        let mut params = EncodeParams::new();
        apply_quality(&mut params, "libx264", 23);
        assert_eq!(params.crf, Some(23));
        assert_eq!(params.cq, None);
    }

    #[test]
    fn quality_mapping_saturates() {
        let mut params = EncodeParams::new();
        apply_quality(&mut params, "h264_nvenc", 60);
        assert_eq!(params.cq, Some(0));
    }

    #[test]
    fn options_have_sensible_defaults() {
        let opts = VideoConvertOptions::default();
        assert_eq!(opts.format, "mp4");
        assert_eq!(opts.video_codec, CodecChoice::Auto);
        assert_eq!(opts.hwaccel, HwaccelChoice::Auto);
        assert_eq!(opts.profile, SpeedProfile::Balanced);
        assert!(opts.preserve_metadata);
    }

    #[test]
    fn options_deserialize_from_partial_json() {
        let opts: VideoConvertOptions =
            serde_json::from_str(r#"{"format": "webm", "crf": 30}"#).unwrap();
        assert_eq!(opts.format, "webm");
        assert_eq!(opts.crf, Some(30));
        assert_eq!(opts.audio_bitrate.as_deref(), Some("192k"));
    }
}
