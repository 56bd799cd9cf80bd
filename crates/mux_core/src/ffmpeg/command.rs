//! FFmpeg command construction.
//!
//! Builds argument lists for conversion runs from a declarative
//! [`EncodeParams`] description. Flag order matters to FFmpeg, so the
//! builder emits arguments in a fixed sequence: input options, input,
//! video options, audio options, stream disposition, global options,
//! output.

use std::path::Path;

/// Bitstream filters required when stream-copying a codec into a
/// container that uses a different packaging.
///
/// Keyed by base codec name, then by output format name.
const BITSTREAM_FILTERS: &[(&str, &[(&str, &str)])] = &[
    // Video codecs
    (
        "h264",
        &[
            ("avi", "h264_mp4toannexb"),
            ("mpegts", "h264_mp4toannexb"),
            ("mpeg", "h264_mp4toannexb"),
            ("vob", "h264_mp4toannexb"),
        ],
    ),
    (
        "hevc",
        &[
            ("avi", "hevc_mp4toannexb"),
            ("mpegts", "hevc_mp4toannexb"),
            ("mpeg", "hevc_mp4toannexb"),
        ],
    ),
    ("mpeg4", &[("mpegts", "mpeg4_unpack_bframes")]),
    // Audio codecs
    ("aac", &[("mpegts", "aac_adtstoasc"), ("mpeg", "aac_adtstoasc")]),
    ("mp3", &[("mpegts", "mp3decomp")]),
];

/// Look up the bitstream filter needed to stream-copy `codec` into
/// `output_format`, if any.
///
/// Codec names with a variant suffix (e.g. `h264_nvenc` decode names)
/// are normalized to their base codec first.
pub fn bitstream_filter(codec: &str, output_format: &str) -> Option<&'static str> {
    let lowered = codec.to_ascii_lowercase();
    let base = lowered.split('_').next().unwrap_or(&lowered);
    let fmt = output_format.to_ascii_lowercase();

    BITSTREAM_FILTERS
        .iter()
        .find(|(c, _)| *c == base)
        .and_then(|(_, table)| table.iter().find(|(f, _)| *f == fmt))
        .map(|(_, bsf)| *bsf)
}

/// Declarative description of a single FFmpeg conversion run.
///
/// `None`/empty fields are simply omitted from the command. A codec of
/// literal `"copy"` triggers stream copy, including the bitstream
/// filter lookup against the input codec.
#[derive(Debug, Clone, Default)]
pub struct EncodeParams {
    /// Hardware decode acceleration method (e.g. "cuda", "qsv").
    pub hwaccel: Option<String>,
    /// Video encoder name, or "copy".
    pub video_codec: Option<String>,
    /// Codec of the input's video stream (for bitstream filter lookup).
    pub input_video_codec: Option<String>,
    /// Software encoder quality (CRF).
    pub crf: Option<u32>,
    /// Hardware encoder quality. Takes precedence over `crf`.
    pub cq: Option<u32>,
    /// Video bitrate (e.g. "5M").
    pub video_bitrate: Option<String>,
    /// Encoder preset.
    pub preset: Option<String>,
    /// Encoder tune.
    pub tune: Option<String>,
    /// Audio encoder name, or "copy".
    pub audio_codec: Option<String>,
    /// Codec of the input's audio stream (for bitstream filter lookup).
    pub input_audio_codec: Option<String>,
    /// Audio bitrate (e.g. "192k").
    pub audio_bitrate: Option<String>,
    /// Audio sample rate in Hz.
    pub sample_rate: Option<u32>,
    /// Audio channel count.
    pub channels: Option<u8>,
    /// Drop the video stream entirely (audio extraction).
    pub no_video: bool,
    /// Drop the audio stream entirely.
    pub no_audio: bool,
    /// Encoder thread count.
    pub threads: Option<u32>,
    /// Keep input metadata in the output. Default true.
    pub preserve_metadata: bool,
    /// Output container format (passed as `-f`).
    pub format: Option<String>,
    /// Extra arguments appended before the output path.
    pub extra_args: Vec<String>,
}

impl EncodeParams {
    /// Create params with metadata preservation on (the common case).
    pub fn new() -> Self {
        Self {
            preserve_metadata: true,
            ..Default::default()
        }
    }
}

/// Build the FFmpeg argument list for a conversion.
///
/// Returns arguments only; the caller prepends the binary path and any
/// progress-reporting flags before spawning.
pub fn build_command(input: &Path, output: &Path, params: &EncodeParams) -> Vec<String> {
    let mut cmd: Vec<String> = vec!["-hide_banner".into(), "-y".into()];

    // Hardware acceleration for decoding (input option, must precede -i)
    if let Some(hwaccel) = &params.hwaccel {
        cmd.push("-hwaccel".into());
        cmd.push(hwaccel.clone());
    }

    cmd.push("-i".into());
    cmd.push(input.to_string_lossy().into_owned());

    // Video codec
    if let Some(video_codec) = &params.video_codec {
        if video_codec == "copy" {
            cmd.push("-c:v".into());
            cmd.push("copy".into());

            if let (Some(format), Some(input_codec)) = (&params.format, &params.input_video_codec) {
                if let Some(bsf) = bitstream_filter(input_codec, format) {
                    cmd.push("-bsf:v".into());
                    cmd.push(bsf.into());
                    tracing::debug!(filter = bsf, "added video bitstream filter");
                }
            }
        } else {
            cmd.push("-c:v".into());
            cmd.push(video_codec.clone());

            // Hardware encoder quality (nvenc, qsv, amf) takes priority
            if let Some(cq) = params.cq {
                if video_codec.contains("nvenc") {
                    cmd.push("-cq".into());
                    cmd.push(cq.to_string());
                } else if video_codec.contains("qsv") {
                    cmd.push("-global_quality".into());
                    cmd.push(cq.to_string());
                } else if video_codec.contains("amf") {
                    cmd.push("-qp_i".into());
                    cmd.push(cq.to_string());
                    cmd.push("-qp_p".into());
                    cmd.push(cq.to_string());
                }
            } else if let Some(crf) = params.crf {
                cmd.push("-crf".into());
                cmd.push(crf.to_string());
            }

            if let Some(bitrate) = &params.video_bitrate {
                cmd.push("-b:v".into());
                cmd.push(bitrate.clone());
            }

            if let Some(preset) = &params.preset {
                cmd.push("-preset".into());
                cmd.push(preset.clone());
            }

            if let Some(tune) = &params.tune {
                cmd.push("-tune".into());
                cmd.push(tune.clone());
            }
        }
    }

    // Audio codec
    if let Some(audio_codec) = &params.audio_codec {
        if audio_codec == "copy" {
            cmd.push("-c:a".into());
            cmd.push("copy".into());

            if let (Some(format), Some(input_codec)) = (&params.format, &params.input_audio_codec) {
                if let Some(bsf) = bitstream_filter(input_codec, format) {
                    cmd.push("-bsf:a".into());
                    cmd.push(bsf.into());
                    tracing::debug!(filter = bsf, "added audio bitstream filter");
                }
            }
        } else {
            cmd.push("-c:a".into());
            cmd.push(audio_codec.clone());

            if let Some(bitrate) = &params.audio_bitrate {
                cmd.push("-b:a".into());
                cmd.push(bitrate.clone());
            }

            if let Some(sample_rate) = params.sample_rate {
                cmd.push("-ar".into());
                cmd.push(sample_rate.to_string());
            }

            if let Some(channels) = params.channels {
                cmd.push("-ac".into());
                cmd.push(channels.to_string());
            }
        }
    }

    // Stream disposition
    if params.no_video {
        cmd.push("-vn".into());
    }
    if params.no_audio {
        cmd.push("-an".into());
    }

    if let Some(threads) = params.threads {
        cmd.push("-threads".into());
        cmd.push(threads.to_string());
    }

    if !params.preserve_metadata {
        cmd.push("-map_metadata".into());
        cmd.push("-1".into());
    }

    if let Some(format) = &params.format {
        cmd.push("-f".into());
        cmd.push(format.clone());
    }

    cmd.extend(params.extra_args.iter().cloned());

    cmd.push(output.to_string_lossy().into_owned());

    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn paths() -> (PathBuf, PathBuf) {
        (PathBuf::from("in.mkv"), PathBuf::from("out.mp4"))
    }

    #[test]
    fn bitstream_filter_lookup() {
        assert_eq!(bitstream_filter("h264", "avi"), Some("h264_mp4toannexb"));
        assert_eq!(bitstream_filter("hevc", "mpegts"), Some("hevc_mp4toannexb"));
        assert_eq!(bitstream_filter("aac", "mpegts"), Some("aac_adtstoasc"));
        assert_eq!(bitstream_filter("mp3", "mpegts"), Some("mp3decomp"));
        assert_eq!(bitstream_filter("h264", "mp4"), None);
        assert_eq!(bitstream_filter("flac", "ogg"), None);
    }

    #[test]
    fn bitstream_filter_normalizes_codec_names() {
        // Suffixed codec names resolve to their base codec
        assert_eq!(
            bitstream_filter("h264_cuvid", "mpegts"),
            Some("h264_mp4toannexb")
        );
        assert_eq!(bitstream_filter("H264", "AVI"), Some("h264_mp4toannexb"));
    }

    #[test]
    fn minimal_command() {
        let (input, output) = paths();
        let cmd = build_command(&input, &output, &EncodeParams::new());
        assert_eq!(cmd, vec!["-hide_banner", "-y", "-i", "in.mkv", "out.mp4"]);
    }

    #[test]
    fn software_encode_flags_in_order() {
        let (input, output) = paths();
        let params = EncodeParams {
            video_codec: Some("libx264".into()),
            crf: Some(23),
            preset: Some("medium".into()),
            audio_codec: Some("aac".into()),
            audio_bitrate: Some("192k".into()),
            format: Some("mp4".into()),
            ..EncodeParams::new()
        };
        let cmd = build_command(&input, &output, &params);
        assert_eq!(
            cmd,
            vec![
                "-hide_banner",
                "-y",
                "-i",
                "in.mkv",
                "-c:v",
                "libx264",
                "-crf",
                "23",
                "-preset",
                "medium",
                "-c:a",
                "aac",
                "-b:a",
                "192k",
                "-f",
                "mp4",
                "out.mp4",
            ]
        );
    }

    #[test]
    fn hardware_quality_flags_per_encoder() {
        let (input, output) = paths();

        let mut params = EncodeParams {
            video_codec: Some("h264_nvenc".into()),
            cq: Some(28),
            crf: Some(23),
            ..EncodeParams::new()
        };
        let cmd = build_command(&input, &output, &params);
        assert!(cmd.windows(2).any(|w| w == ["-cq", "28"]));
        // cq wins over crf
        assert!(!cmd.contains(&"-crf".to_string()));

        params.video_codec = Some("hevc_qsv".into());
        let cmd = build_command(&input, &output, &params);
        assert!(cmd.windows(2).any(|w| w == ["-global_quality", "28"]));

        params.video_codec = Some("h264_amf".into());
        let cmd = build_command(&input, &output, &params);
        assert!(cmd.windows(2).any(|w| w == ["-qp_i", "28"]));
        assert!(cmd.windows(2).any(|w| w == ["-qp_p", "28"]));
    }

    #[test]
    fn copy_adds_bitstream_filter() {
        let (input, _) = paths();
        let output = PathBuf::from("out.ts");
        let params = EncodeParams {
            video_codec: Some("copy".into()),
            input_video_codec: Some("h264".into()),
            audio_codec: Some("copy".into()),
            input_audio_codec: Some("aac".into()),
            format: Some("mpegts".into()),
            ..EncodeParams::new()
        };
        let cmd = build_command(&input, &output, &params);
        assert!(cmd.windows(2).any(|w| w == ["-bsf:v", "h264_mp4toannexb"]));
        assert!(cmd.windows(2).any(|w| w == ["-bsf:a", "aac_adtstoasc"]));
    }

    #[test]
    fn copy_skips_quality_flags() {
        let (input, output) = paths();
        let params = EncodeParams {
            video_codec: Some("copy".into()),
            crf: Some(23),
            preset: Some("medium".into()),
            ..EncodeParams::new()
        };
        let cmd = build_command(&input, &output, &params);
        assert!(!cmd.contains(&"-crf".to_string()));
        assert!(!cmd.contains(&"-preset".to_string()));
    }

    #[test]
    fn audio_extraction_command() {
        let (input, _) = paths();
        let output = PathBuf::from("out.mp3");
        let params = EncodeParams {
            audio_codec: Some("libmp3lame".into()),
            audio_bitrate: Some("192k".into()),
            sample_rate: Some(44100),
            channels: Some(2),
            no_video: true,
            format: Some("mp3".into()),
            ..EncodeParams::new()
        };
        let cmd = build_command(&input, &output, &params);
        assert!(cmd.contains(&"-vn".to_string()));
        assert!(cmd.windows(2).any(|w| w == ["-ar", "44100"]));
        assert!(cmd.windows(2).any(|w| w == ["-ac", "2"]));
    }

    #[test]
    fn metadata_stripping() {
        let (input, output) = paths();
        let mut params = EncodeParams::new();
        let cmd = build_command(&input, &output, &params);
        assert!(!cmd.contains(&"-map_metadata".to_string()));

        params.preserve_metadata = false;
        let cmd = build_command(&input, &output, &params);
        assert!(cmd.windows(2).any(|w| w == ["-map_metadata", "-1"]));
    }

    #[test]
    fn hwaccel_precedes_input() {
        let (input, output) = paths();
        let params = EncodeParams {
            hwaccel: Some("cuda".into()),
            ..EncodeParams::new()
        };
        let cmd = build_command(&input, &output, &params);
        let hw_pos = cmd.iter().position(|a| a == "-hwaccel").unwrap();
        let input_pos = cmd.iter().position(|a| a == "-i").unwrap();
        assert!(hw_pos < input_pos);
    }

    #[test]
    fn extra_args_come_before_output() {
        let (input, output) = paths();
        let params = EncodeParams {
            extra_args: vec!["-movflags".into(), "+faststart".into()],
            ..EncodeParams::new()
        };
        let cmd = build_command(&input, &output, &params);
        let len = cmd.len();
        assert_eq!(cmd[len - 3], "-movflags");
        assert_eq!(cmd[len - 2], "+faststart");
        assert_eq!(cmd[len - 1], "out.mp4");
    }
}
