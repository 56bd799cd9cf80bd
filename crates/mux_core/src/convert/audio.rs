//! Audio file conversion.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::detect::Capabilities;
use crate::ffmpeg::{build_command, render_command, EncodeParams, RunOptions};
use crate::models::{AudioQuality, CodecChoice};

use super::tables;
use super::{ConvertContext, ConvertError, ConvertResult};

/// Options for an audio conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConvertOptions {
    /// Output format extension.
    #[serde(default = "default_audio_format")]
    pub format: String,

    /// Encoder selection.
    #[serde(default)]
    pub codec: CodecChoice,

    /// Bitrate (e.g. "192k"). `None` lets the encoder decide.
    #[serde(default = "default_bitrate")]
    pub bitrate: Option<String>,

    /// Sample rate in Hz.
    #[serde(default)]
    pub sample_rate: Option<u32>,

    /// Channel count.
    #[serde(default)]
    pub channels: Option<u8>,

    /// VBR quality tier, for formats that support it.
    #[serde(default)]
    pub quality: Option<AudioQuality>,

    /// Keep input metadata.
    #[serde(default = "default_true")]
    pub preserve_metadata: bool,
}

fn default_audio_format() -> String {
    "mp3".to_string()
}

fn default_bitrate() -> Option<String> {
    Some("192k".to_string())
}

fn default_true() -> bool {
    true
}

impl Default for AudioConvertOptions {
    fn default() -> Self {
        Self {
            format: default_audio_format(),
            codec: CodecChoice::Auto,
            bitrate: default_bitrate(),
            sample_rate: None,
            channels: None,
            quality: None,
            preserve_metadata: true,
        }
    }
}

/// Converts audio files, resolving codecs against the installed build.
pub struct AudioConverter {
    caps: Arc<Capabilities>,
}

impl AudioConverter {
    pub fn new(caps: Arc<Capabilities>) -> Self {
        Self { caps }
    }

    /// Convert an audio file into `output_dir`, named after the input
    /// stem with the target extension. Returns the output path.
    pub fn convert(
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

        let codec = self.resolve_codec(&opts.codec, &opts.format);
        if let Some(logger) = ctx.logger {
            logger.encoder(&codec);
        }

        let mut extra_args = Vec::new();
        if let Some(quality) = opts.quality {
            extra_args.extend(tables::quality_args(&opts.format, quality));
        }

        let params = EncodeParams {
            audio_codec: Some(codec.clone()),
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
            extra_args,
            ..EncodeParams::new()
        };

        let duration_secs = self.probe_duration(input);
        run_conversion(self.caps.as_ref(), input, &output, &params, duration_secs, ctx)?;

        if !output.exists() {
            return Err(ConvertError::OutputMissing(output));
        }

        tracing::info!(output = %output.display(), "audio conversion complete");
        Ok(output)
    }

    /// Resolve a codec choice against the build's encoders.
    ///
    /// Explicitly named codecs that are missing fall back to automatic
    /// selection with a warning.
    pub fn resolve_codec(&self, choice: &CodecChoice, format: &str) -> String {
        match choice {
            CodecChoice::Copy => "copy".to_string(),
            CodecChoice::Auto => self.best_codec(format),
            CodecChoice::Named(name) => {
                if self.caps.audio_encoders().contains(name) {
                    name.clone()
                } else {
                    tracing::warn!(codec = %name, "codec not available, using auto-selection");
                    self.best_codec(format)
                }
            }
        }
    }

    /// Best available encoder for a format: recommended codec if the
    /// build has it, then the fallback chain, then copy.
    fn best_codec(&self, format: &str) -> String {
        let available = self.caps.audio_encoders();

        if let Some(recommended) = tables::audio_codec(format) {
            if available.contains(recommended) {
                return recommended.to_string();
            }
        }

        for codec in tables::audio_codec_fallbacks(format) {
            if available.contains(*codec) {
                return codec.to_string();
            }
        }

        "copy".to_string()
    }

    fn probe_duration(&self, input: &Path) -> Option<f64> {
        self.caps
            .toolchain()
            .probe(input)
            .ok()
            .and_then(|info| info.duration_secs)
    }
}

/// Output path for a conversion: input stem plus the target extension.
pub(super) fn output_path(input: &Path, output_dir: &Path, format: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output_dir.join(format!("{}.{}", stem, format))
}

/// Shared execution path: log the command, run it, surface the stderr
/// tail through the job logger on failure.
pub(super) fn run_conversion(
    caps: &Capabilities,
    input: &Path,
    output: &Path,
    params: &EncodeParams,
    duration_secs: Option<f64>,
    ctx: ConvertContext<'_>,
) -> ConvertResult<()> {
    let args = build_command(input, output, params);

    if let Some(logger) = ctx.logger {
        logger.command(&render_command("ffmpeg", &args));
    }

    let progress_cb = |p: &crate::ffmpeg::Progress| {
        if let Some(logger) = ctx.logger {
            logger.progress(p.percent(), p.speed);
        }
        if let Some(cb) = ctx.on_progress {
            cb(p);
        }
    };
    let stderr_cb = |line: &str| {
        if let Some(logger) = ctx.logger {
            logger.output_line(line, true);
        }
    };

    let run = RunOptions {
        duration_secs,
        cancel: ctx.cancel,
        on_progress: Some(&progress_cb),
        on_stderr_line: Some(&stderr_cb),
    };

    let result = caps.toolchain().execute(&args, run);

    if let Err(err) = &result {
        if let Some(logger) = ctx.logger {
            logger.error(&err.to_string());
            logger.show_tail("ffmpeg");
        }
    }

    result.map_err(ConvertError::from)
}
