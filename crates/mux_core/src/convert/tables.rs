//! Format, codec, and encoder lookup tables.
//!
//! Static knowledge about containers and codecs: which FFmpeg muxer
//! backs each output extension, which codec suits each container, the
//! fallback chains when a preferred codec is missing from the build,
//! and VBR quality flags per audio format.

use crate::models::{AudioQuality, CodecFamily};

/// Video output extension to FFmpeg muxer name.
pub const VIDEO_FORMAT_MUXERS: &[(&str, &str)] = &[
    ("mp4", "mp4"),
    ("m4v", "mp4"),
    ("mov", "mov"),
    ("avi", "avi"),
    ("mkv", "matroska"),
    ("webm", "webm"),
    ("flv", "flv"),
    ("ogv", "ogg"),
    ("mpeg", "mpeg"),
    ("mpg", "mpeg"),
    ("ts", "mpegts"),
    ("m2ts", "mpegts"),
    ("mxf", "mxf"),
    ("3gp", "3gp"),
    ("3g2", "3g2"),
    ("asf", "asf"),
    ("wmv", "asf"),
    ("vob", "vob"),
];

/// Recommended audio codec per video container.
pub const VIDEO_AUDIO_CODECS: &[(&str, &str)] = &[
    ("mp4", "aac"),
    ("m4v", "aac"),
    ("mkv", "aac"),
    ("mov", "aac"),
    ("webm", "libopus"),
    ("avi", "mp3"),
    ("flv", "mp3"),
    ("ogv", "libvorbis"),
    ("mpeg", "mp2"),
    ("mpg", "mp2"),
    ("wmv", "wmav2"),
    ("3gp", "aac"),
    ("ts", "aac"),
    ("m2ts", "aac"),
];

/// Software video encoder fallbacks per container.
pub const VIDEO_CODEC_FALLBACKS: &[(&str, &[&str])] = &[
    ("mp4", &["libx264"]),
    ("mkv", &["libx264", "libx265"]),
    ("webm", &["libvpx-vp9", "libvpx"]),
    ("avi", &["libx264", "mpeg4"]),
    ("mov", &["libx264"]),
];

/// Audio codec fallbacks per video container.
pub const VIDEO_AUDIO_FALLBACKS: &[(&str, &[&str])] = &[
    ("mp4", &["aac", "libfdk_aac"]),
    ("mkv", &["aac", "libopus", "libvorbis"]),
    ("webm", &["libopus", "libvorbis"]),
    ("avi", &["libmp3lame", "mp3", "aac"]),
];

/// Containers that benefit from `-movflags +faststart`.
pub const FASTSTART_FORMATS: &[&str] = &["mp4", "m4v", "mov"];

/// Audio output extension to FFmpeg muxer name.
pub const AUDIO_FORMAT_MUXERS: &[(&str, &str)] = &[
    ("mp3", "mp3"),
    ("wav", "wav"),
    ("flac", "flac"),
    ("ogg", "ogg"),
    ("oga", "ogg"),
    ("opus", "ogg"),
    ("spx", "ogg"),
    ("aac", "adts"),
    ("m4a", "mp4"),
    ("m4b", "mp4"),
    ("m4r", "mp4"),
    ("ac3", "ac3"),
    ("aiff", "aiff"),
    ("aif", "aiff"),
    ("aifc", "aiff"),
    ("caf", "caf"),
    ("au", "au"),
    ("amr", "amr"),
    ("dts", "dts"),
    ("mp2", "mp2"),
    ("wma", "asf"),
    ("wv", "wv"),
    ("mka", "matroska"),
    ("ape", "ape"),
    ("tta", "tta"),
    ("w64", "w64"),
];

/// Recommended encoder per audio format.
pub const AUDIO_CODECS: &[(&str, &str)] = &[
    ("mp3", "libmp3lame"),
    ("wav", "pcm_s16le"),
    ("flac", "flac"),
    ("ogg", "libvorbis"),
    ("opus", "libopus"),
    ("spx", "libspeex"),
    ("aac", "aac"),
    ("m4a", "aac"),
    ("ac3", "ac3"),
    ("aiff", "pcm_s16be"),
    ("wma", "wmav2"),
    ("amr", "libopencore_amrnb"),
    ("dts", "dca"),
    ("mp2", "mp2"),
    ("wv", "wavpack"),
    ("ape", "ape"),
    ("tta", "tta"),
];

/// Encoder fallbacks per audio format.
pub const AUDIO_CODEC_FALLBACKS: &[(&str, &[&str])] = &[
    ("mp3", &["libmp3lame", "mp3"]),
    ("ogg", &["libvorbis", "vorbis"]),
    ("opus", &["libopus", "opus"]),
    ("aac", &["aac", "libfdk_aac"]),
    ("m4a", &["aac", "libfdk_aac"]),
    ("flac", &["flac"]),
    ("wav", &["pcm_s16le", "pcm_s24le", "pcm_s32le"]),
    ("wma", &["wmav2", "wmav1"]),
];

/// Hardware-first encoder priority per codec family. Each entry is
/// verified against the installed build before election.
pub const fn encoder_priority(family: CodecFamily) -> &'static [&'static str] {
    match family {
        CodecFamily::H264 => &[
            "h264_nvenc",
            "h264_qsv",
            "h264_amf",
            "h264_videotoolbox",
            "h264_vaapi",
            "h264_v4l2m2m",
            "libx264",
        ],
        CodecFamily::Hevc => &[
            "hevc_nvenc",
            "hevc_qsv",
            "hevc_amf",
            "hevc_videotoolbox",
            "hevc_vaapi",
            "libx265",
        ],
        CodecFamily::Vp9 => &["vp9_qsv", "vp9_vaapi", "libvpx-vp9"],
        CodecFamily::Av1 => &["av1_nvenc", "av1_qsv", "av1_amf", "libsvtav1", "libaom-av1"],
    }
}

/// Decode acceleration priority order.
pub const HWACCEL_DECODE_PRIORITY: &[&str] =
    &["cuda", "qsv", "dxva2", "d3d11va", "videotoolbox", "vaapi"];

/// Containers that take their video codec from the H.264 election.
pub const H264_CONTAINERS: &[&str] = &["mp4", "mkv", "avi", "mov", "m4v", "ts", "m2ts"];

fn lookup(table: &[(&str, &'static str)], key: &str) -> Option<&'static str> {
    let key = key.to_ascii_lowercase();
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

fn lookup_list(table: &[(&str, &'static [&'static str])], key: &str) -> &'static [&'static str] {
    let key = key.to_ascii_lowercase();
    table
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
        .unwrap_or(&[])
}

/// FFmpeg muxer name for a video output extension.
pub fn video_muxer(ext: &str) -> Option<&'static str> {
    lookup(VIDEO_FORMAT_MUXERS, ext)
}

/// Recommended audio codec for a video container.
pub fn video_audio_codec(ext: &str) -> Option<&'static str> {
    lookup(VIDEO_AUDIO_CODECS, ext)
}

/// Software fallback video encoders for a container.
pub fn video_codec_fallbacks(ext: &str) -> &'static [&'static str] {
    lookup_list(VIDEO_CODEC_FALLBACKS, ext)
}

/// Audio codec fallbacks for a video container.
pub fn video_audio_fallbacks(ext: &str) -> &'static [&'static str] {
    lookup_list(VIDEO_AUDIO_FALLBACKS, ext)
}

/// FFmpeg muxer name for an audio output extension.
pub fn audio_muxer(ext: &str) -> Option<&'static str> {
    lookup(AUDIO_FORMAT_MUXERS, ext)
}

/// Recommended encoder for an audio format.
pub fn audio_codec(ext: &str) -> Option<&'static str> {
    lookup(AUDIO_CODECS, ext)
}

/// Encoder fallbacks for an audio format.
pub fn audio_codec_fallbacks(ext: &str) -> &'static [&'static str] {
    lookup_list(AUDIO_CODEC_FALLBACKS, ext)
}

/// Whether a container should be written with `+faststart`.
pub fn wants_faststart(ext: &str) -> bool {
    FASTSTART_FORMATS.contains(&ext.to_ascii_lowercase().as_str())
}

/// VBR quality flags for an audio format, if the format supports them.
pub fn quality_args(format: &str, quality: AudioQuality) -> Vec<String> {
    match format.to_ascii_lowercase().as_str() {
        // MP3 VBR quality (0-9, lower is better)
        "mp3" => {
            let q = match quality {
                AudioQuality::Highest => "0",
                AudioQuality::High => "2",
                AudioQuality::Medium => "4",
                AudioQuality::Low => "6",
            };
            vec!["-q:a".to_string(), q.to_string()]
        }
        // Vorbis/Opus quality (higher is better)
        "ogg" | "opus" => {
            let q = match quality {
                AudioQuality::Highest => "10",
                AudioQuality::High => "8",
                AudioQuality::Medium => "6",
                AudioQuality::Low => "4",
            };
            vec!["-q:a".to_string(), q.to_string()]
        }
        // FLAC compression level (0-12)
        "flac" => {
            let q = match quality {
                AudioQuality::Highest => "12",
                AudioQuality::High => "8",
                AudioQuality::Medium => "5",
                AudioQuality::Low => "0",
            };
            vec!["-compression_level".to_string(), q.to_string()]
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_muxer_lookup() {
        assert_eq!(video_muxer("mp4"), Some("mp4"));
        assert_eq!(video_muxer("mkv"), Some("matroska"));
        assert_eq!(video_muxer("wmv"), Some("asf"));
        assert_eq!(video_muxer("MKV"), Some("matroska"));
        assert_eq!(video_muxer("xyz"), None);
    }

    #[test]
    fn audio_muxer_lookup() {
        assert_eq!(audio_muxer("opus"), Some("ogg"));
        assert_eq!(audio_muxer("aac"), Some("adts"));
        assert_eq!(audio_muxer("m4a"), Some("mp4"));
        assert_eq!(audio_muxer("mka"), Some("matroska"));
        assert_eq!(audio_muxer("unknown"), None);
    }

    #[test]
    fn recommended_codecs() {
        assert_eq!(video_audio_codec("webm"), Some("libopus"));
        assert_eq!(video_audio_codec("mpeg"), Some("mp2"));
        assert_eq!(audio_codec("mp3"), Some("libmp3lame"));
        assert_eq!(audio_codec("wav"), Some("pcm_s16le"));
        assert_eq!(audio_codec("aiff"), Some("pcm_s16be"));
    }

    #[test]
    fn fallback_chains() {
        assert_eq!(video_codec_fallbacks("webm"), &["libvpx-vp9", "libvpx"]);
        assert_eq!(
            audio_codec_fallbacks("wav"),
            &["pcm_s16le", "pcm_s24le", "pcm_s32le"]
        );
        assert!(video_codec_fallbacks("vob").is_empty());
    }

    #[test]
    fn priority_lists_end_in_software() {
        assert_eq!(*encoder_priority(CodecFamily::H264).last().unwrap(), "libx264");
        assert_eq!(*encoder_priority(CodecFamily::Hevc).last().unwrap(), "libx265");
        assert_eq!(
            *encoder_priority(CodecFamily::Vp9).last().unwrap(),
            "libvpx-vp9"
        );
        assert_eq!(
            *encoder_priority(CodecFamily::Av1).last().unwrap(),
            "libaom-av1"
        );
    }

    #[test]
    fn faststart_containers() {
        assert!(wants_faststart("mp4"));
        assert!(wants_faststart("mov"));
        assert!(!wants_faststart("mkv"));
        assert!(!wants_faststart("webm"));
    }

    #[test]
    fn quality_flags_per_format() {
        assert_eq!(quality_args("mp3", AudioQuality::Highest), vec!["-q:a", "0"]);
        assert_eq!(quality_args("ogg", AudioQuality::High), vec!["-q:a", "8"]);
        assert_eq!(
            quality_args("flac", AudioQuality::Medium),
            vec!["-compression_level", "5"]
        );
        assert!(quality_args("wav", AudioQuality::High).is_empty());
    }
}
