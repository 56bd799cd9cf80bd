//! FFmpeg capability detection.
//!
//! Queries the installed FFmpeg build for its muxers, codecs, encoders,
//! and hardware acceleration methods, and verifies that hardware paths
//! actually work by running tiny test encodes against lavfi sources.
//! Everything is probed once and cached for the process lifetime.

use std::collections::HashSet;
use std::time::Duration;

use parking_lot::Mutex;

use crate::ffmpeg::Toolchain;

/// Deadline for `-formats`/`-encoders`/`-hwaccels` listing runs.
const LIST_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline for the null-source hardware decode test.
const HWACCEL_TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline for one-frame software encoder test runs.
const ENCODER_TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline for hardware encoder tests, which can wedge on broken
/// driver stacks.
const ENCODER_HW_TEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Audio container formats the converter offers when the muxer exists.
const KNOWN_AUDIO_FORMATS: &[&str] = &[
    "mp3", "wav", "flac", "ogg", "aac", "m4a", "opus", "wma", "aiff", "ac3", "dts", "amr", "ape",
    "tta", "wv", "mp2", "au", "caf", "w64", "spx",
];

/// Fallback audio formats when detection yields nothing usable.
const FALLBACK_AUDIO_FORMATS: &[&str] = &["mp3", "wav", "flac", "ogg", "aac", "m4a"];

/// Video output extensions mapped to the FFmpeg muxer that backs them.
const VIDEO_EXT_MUXERS: &[(&str, &str)] = &[
    ("mp4", "mp4"),
    ("mkv", "matroska"),
    ("avi", "avi"),
    ("mov", "mov"),
    ("webm", "webm"),
    ("flv", "flv"),
    ("mpeg", "mpeg"),
    ("mpg", "mpeg"),
    ("ts", "mpegts"),
    ("m2ts", "mpegts"),
    ("mts", "mpegts"),
    ("mxf", "mxf"),
    ("3gp", "3gp"),
    ("3g2", "3g2"),
    ("wmv", "asf"),
    ("asf", "asf"),
    ("vob", "vob"),
    ("m4v", "mp4"),
    ("f4v", "flv"),
];

/// Fallback video formats when detection yields nothing usable.
const FALLBACK_VIDEO_FORMATS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm"];

/// Stderr patterns showing a hwaccel method is present but non-functional.
const HWACCEL_ERROR_PATTERNS: &[&str] = &[
    "cannot load",
    "could not dynamically load",
    "device creation failed",
    "no device available",
    "hardware device setup failed",
    "not found",
    "not supported",
];

/// Stderr patterns showing an encoder is missing from the build.
const ENCODER_CRITICAL_PATTERNS: &[&str] = &[
    "unknown encoder",
    "encoder not found",
    "cannot load",
    "not compiled",
    "could not find encoder",
];

/// Stderr patterns showing hardware an encoder needs is absent.
const ENCODER_HW_ERROR_PATTERNS: &[&str] = &[
    "no device available",
    "failed to open",
    "cannot initialize",
    "not supported",
    "device creation failed",
    "no hwaccel device",
];

/// Hardware encoder name fragments.
const HW_ENCODER_MARKERS: &[&str] = &["nvenc", "qsv", "amf", "vaapi", "videotoolbox"];

/// Cached view of what the local FFmpeg build can do.
pub struct Capabilities {
    toolchain: Toolchain,
    audio_formats: Mutex<Option<HashSet<String>>>,
    video_formats: Mutex<Option<HashSet<String>>>,
    audio_encoders: Mutex<Option<HashSet<String>>>,
    video_encoders: Mutex<Option<HashSet<String>>>,
    hwaccels: Mutex<Option<HashSet<String>>>,
    working_hwaccels: Mutex<Option<HashSet<String>>>,
}

impl Capabilities {
    /// Create a capability prober for the given toolchain. Nothing is
    /// queried until first use.
    pub fn new(toolchain: Toolchain) -> Self {
        Self {
            toolchain,
            audio_formats: Mutex::new(None),
            video_formats: Mutex::new(None),
            audio_encoders: Mutex::new(None),
            video_encoders: Mutex::new(None),
            hwaccels: Mutex::new(None),
            working_hwaccels: Mutex::new(None),
        }
    }

    /// Access the underlying toolchain.
    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    fn listing(&self, flag: &str) -> String {
        self.toolchain
            .capture_stdout(&["-hide_banner", flag], LIST_TIMEOUT)
            .unwrap_or_default()
    }

    /// Audio output formats this build can write.
    pub fn audio_formats(&self) -> HashSet<String> {
        let mut cache = self.audio_formats.lock();
        if let Some(formats) = cache.as_ref() {
            return formats.clone();
        }

        let muxers = parse_muxers(&self.listing("-formats"));
        let mut formats: HashSet<String> = KNOWN_AUDIO_FORMATS
            .iter()
            .filter(|f| muxers.contains(**f))
            .map(|f| f.to_string())
            .collect();

        if formats.is_empty() {
            formats = FALLBACK_AUDIO_FORMATS.iter().map(|f| f.to_string()).collect();
        }

        *cache = Some(formats.clone());
        formats
    }

    /// Video output extensions this build can write.
    pub fn video_formats(&self) -> HashSet<String> {
        let mut cache = self.video_formats.lock();
        if let Some(formats) = cache.as_ref() {
            return formats.clone();
        }

        let muxers = parse_muxers(&self.listing("-formats"));
        let mut formats: HashSet<String> = VIDEO_EXT_MUXERS
            .iter()
            .filter(|(_, muxer)| muxers.contains(*muxer))
            .map(|(ext, _)| ext.to_string())
            .collect();

        if formats.is_empty() {
            formats = FALLBACK_VIDEO_FORMATS.iter().map(|f| f.to_string()).collect();
        }

        *cache = Some(formats.clone());
        formats
    }

    /// Available audio encoders.
    pub fn audio_encoders(&self) -> HashSet<String> {
        let mut cache = self.audio_encoders.lock();
        if let Some(encoders) = cache.as_ref() {
            return encoders.clone();
        }

        let encoders = parse_encoders(&self.listing("-encoders"), 'A');
        *cache = Some(encoders.clone());
        encoders
    }

    /// Available video encoders.
    pub fn video_encoders(&self) -> HashSet<String> {
        let mut cache = self.video_encoders.lock();
        if let Some(encoders) = cache.as_ref() {
            return encoders.clone();
        }

        let encoders = parse_encoders(&self.listing("-encoders"), 'V');
        *cache = Some(encoders.clone());
        encoders
    }

    /// Hardware acceleration methods the build was compiled with.
    pub fn hwaccels(&self) -> HashSet<String> {
        let mut cache = self.hwaccels.lock();
        if let Some(hwaccels) = cache.as_ref() {
            return hwaccels.clone();
        }

        let hwaccels = parse_hwaccels(&self.listing("-hwaccels"));
        *cache = Some(hwaccels.clone());
        hwaccels
    }

    /// Hardware acceleration methods that pass a decode test on this
    /// machine. Each method is tested once and the verdict cached.
    pub fn working_hwaccels(&self) -> HashSet<String> {
        {
            let cache = self.working_hwaccels.lock();
            if let Some(working) = cache.as_ref() {
                return working.clone();
            }
        }

        let available = self.hwaccels();
        let working: HashSet<String> = available
            .into_iter()
            .filter(|hw| self.test_hwaccel(hw))
            .collect();

        if working.is_empty() {
            tracing::debug!("no working hardware acceleration found");
        } else {
            let mut names: Vec<&str> = working.iter().map(String::as_str).collect();
            names.sort_unstable();
            tracing::debug!("hardware acceleration available: {}", names.join(", "));
        }

        *self.working_hwaccels.lock() = Some(working.clone());
        working
    }

    /// Test whether a hardware acceleration method actually works by
    /// decoding a short null source through it.
    pub fn test_hwaccel(&self, hwaccel: &str) -> bool {
        let args = [
            "-hide_banner",
            "-v",
            "error",
            "-hwaccel",
            hwaccel,
            "-f",
            "lavfi",
            "-i",
            "nullsrc=s=256x256:d=0.1",
            "-f",
            "null",
            "-",
        ];

        let Ok(run) = self.toolchain.run_quiet(&args, HWACCEL_TEST_TIMEOUT) else {
            return false;
        };

        if run.success {
            return true;
        }
        if run.timed_out {
            tracing::debug!(hwaccel, "hwaccel test killed at deadline");
            return false;
        }

        let lowered = run.stderr.to_ascii_lowercase();
        !HWACCEL_ERROR_PATTERNS.iter().any(|p| lowered.contains(p))
    }

    /// Test whether an encoder works by encoding one frame from a lavfi
    /// source to null output.
    ///
    /// Hardware encoders get device initialization where required and a
    /// strict failure policy; software encoders are given the benefit of
    /// the doubt on non-critical errors.
    pub fn test_encoder(&self, encoder: &str) -> bool {
        let lowered = encoder.to_ascii_lowercase();
        let is_hardware = HW_ENCODER_MARKERS.iter().any(|m| lowered.contains(m));

        let mut args: Vec<&str> = vec!["-hide_banner", "-v", "error"];

        if is_hardware {
            if lowered.contains("qsv") {
                args.extend(["-init_hw_device", "qsv=hw", "-filter_hw_device", "hw"]);
            } else if lowered.contains("vaapi") {
                args.extend([
                    "-init_hw_device",
                    "vaapi=hw:/dev/dri/renderD128",
                    "-filter_hw_device",
                    "hw",
                ]);
            }
            args.extend(["-f", "lavfi", "-i", "color=c=black:s=256x256:d=0.1:r=1"]);
        } else {
            args.extend(["-f", "lavfi", "-i", "testsrc=duration=0.1:size=256x256:rate=1"]);
        }

        args.extend(["-c:v", encoder, "-frames:v", "1", "-f", "null", "-"]);

        let deadline = if is_hardware {
            ENCODER_HW_TEST_TIMEOUT
        } else {
            ENCODER_TEST_TIMEOUT
        };

        let Ok(run) = self.toolchain.run_quiet(&args, deadline) else {
            tracing::debug!(encoder, "encoder test failed to run");
            return false;
        };

        if run.success {
            tracing::debug!(encoder, "encoder test passed");
            return true;
        }
        if run.timed_out {
            tracing::debug!(encoder, "encoder test killed at deadline");
            return false;
        }

        let err = run.stderr.to_ascii_lowercase();

        if ENCODER_CRITICAL_PATTERNS.iter().any(|p| err.contains(p)) {
            tracing::debug!(encoder, "encoder missing from build");
            return false;
        }

        if ENCODER_HW_ERROR_PATTERNS.iter().any(|p| err.contains(p)) {
            tracing::debug!(encoder, "encoder hardware unavailable");
            return false;
        }

        // QSV and AMF failures tend to surface as runtime session errors
        if lowered.contains("qsv")
            && ["mfx", "session", "error creating"].iter().any(|p| err.contains(p))
        {
            tracing::debug!(encoder, "QSV session initialization failed");
            return false;
        }
        if lowered.contains("amf")
            && ["amf", "failed to initialize", "context creation"]
                .iter()
                .any(|p| err.contains(p))
        {
            tracing::debug!(encoder, "AMF initialization failed");
            return false;
        }

        // Unclassified error: strict for hardware, lenient for software
        if is_hardware {
            tracing::debug!(encoder, "hardware encoder failed test");
            return false;
        }

        tracing::debug!(encoder, "software encoder assumed working despite error");
        true
    }
}

/// Parse `-formats` output for muxer names (entries carrying the E flag).
fn parse_muxers(output: &str) -> HashSet<String> {
    let mut muxers = HashSet::new();
    let mut in_list = false;

    for line in output.lines() {
        if !in_list {
            if line.trim_start().starts_with("--") {
                in_list = true;
            }
            continue;
        }

        let mut tokens = line.split_whitespace();
        let Some(flags) = tokens.next() else { continue };
        // Flags field is "D", "E", or "DE"
        if flags.len() > 2 || !flags.contains('E') {
            continue;
        }
        if let Some(names) = tokens.next() {
            for name in names.split(',') {
                muxers.insert(name.trim().to_string());
            }
        }
    }

    muxers
}

/// Parse `-encoders` output for encoders of the given kind ('V' or 'A').
fn parse_encoders(output: &str, kind: char) -> HashSet<String> {
    let mut encoders = HashSet::new();
    let mut in_list = false;

    for line in output.lines() {
        if !in_list {
            if line.trim_start().starts_with("------") {
                in_list = true;
            }
            continue;
        }

        let mut tokens = line.split_whitespace();
        let Some(flags) = tokens.next() else { continue };
        if !flags.starts_with(kind) {
            continue;
        }
        if let Some(name) = tokens.next() {
            encoders.insert(name.to_string());
        }
    }

    encoders
}

/// Parse `-hwaccels` output.
fn parse_hwaccels(output: &str) -> HashSet<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("Hardware"))
        .map(|line| line.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORMATS_OUTPUT: &str = "\
Formats:
 D. = Demuxing supported
 .E = Muxing supported
 --
 D  aa              Audible AA format files
 DE ac3             raw AC-3
  E adts            ADTS AAC (Advanced Audio Coding)
 DE avi             AVI (Audio Video Interleaved)
 DE flac            raw FLAC
 D  gif_pipe        piped gif sequence
 DE matroska,webm   Matroska / WebM
  E mp4             MP4 (MPEG-4 Part 14)
 DE mp3             MP3 (MPEG audio layer 3)
 DE ogg             Ogg
 DE wav             WAV / WAVE (Waveform Audio)
";

    const ENCODERS_OUTPUT: &str = "\
Encoders:
 V..... = Video
 A..... = Audio
 S..... = Subtitle
 .F.... = Frame-level multithreading
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC
 V....D h264_nvenc           NVIDIA NVENC H.264 encoder
 V..... libx265              libx265 H.265 / HEVC
 A....D aac                  AAC (Advanced Audio Coding)
 A....D libmp3lame           libmp3lame MP3 (MPEG audio layer 3)
 A....D flac                 FLAC (Free Lossless Audio Codec)
 S..... srt                  SubRip subtitle
";

    const HWACCELS_OUTPUT: &str = "\
Hardware acceleration methods:
cuda
vaapi
qsv
";

    #[test]
    fn parses_muxers_with_e_flag() {
        let muxers = parse_muxers(FORMATS_OUTPUT);
        assert!(muxers.contains("mp4"));
        assert!(muxers.contains("matroska"));
        assert!(muxers.contains("webm"));
        assert!(muxers.contains("mp3"));
        // Demux-only entries are excluded
        assert!(!muxers.contains("aa"));
        assert!(!muxers.contains("gif_pipe"));
    }

    #[test]
    fn parses_video_encoders() {
        let encoders = parse_encoders(ENCODERS_OUTPUT, 'V');
        assert!(encoders.contains("libx264"));
        assert!(encoders.contains("h264_nvenc"));
        assert!(encoders.contains("libx265"));
        assert!(!encoders.contains("aac"));
        assert!(!encoders.contains("srt"));
        // Legend lines above the separator must not leak in
        assert!(!encoders.contains("="));
    }

    #[test]
    fn parses_audio_encoders() {
        let encoders = parse_encoders(ENCODERS_OUTPUT, 'A');
        assert_eq!(encoders.len(), 3);
        assert!(encoders.contains("aac"));
        assert!(encoders.contains("libmp3lame"));
        assert!(encoders.contains("flac"));
    }

    #[test]
    fn parses_hwaccels() {
        let hwaccels = parse_hwaccels(HWACCELS_OUTPUT);
        assert_eq!(hwaccels.len(), 3);
        assert!(hwaccels.contains("cuda"));
        assert!(hwaccels.contains("vaapi"));
        assert!(hwaccels.contains("qsv"));
    }

    #[test]
    fn empty_listing_parses_to_empty_sets() {
        assert!(parse_muxers("").is_empty());
        assert!(parse_encoders("", 'V').is_empty());
        assert!(parse_hwaccels("").is_empty());
    }
}
