//! Conversion engine: video and audio converters over the FFmpeg layer.
//!
//! Converters resolve "auto" codec and hwaccel choices against the
//! detected capabilities, apply container-specific defaults from the
//! lookup tables, and drive the runner with progress and cancellation
//! wired through.

mod audio;
pub mod tables;
mod video;

pub use audio::{AudioConvertOptions, AudioConverter};
pub use video::{VideoConvertOptions, VideoConverter};

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::ffmpeg::{CancelFlag, FfmpegError, ProbeError, Progress};
use crate::logging::JobLogger;

/// Errors from conversion operations.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Ffmpeg(#[from] FfmpegError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error("Conversion produced no output file: {0}")]
    OutputMissing(PathBuf),
}

impl ConvertError {
    /// Whether this error is a user-requested cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConvertError::Ffmpeg(FfmpegError::Cancelled))
    }
}

/// Result type for conversion operations.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Per-run hooks passed into a conversion: job logging, cancellation,
/// and progress reporting. All optional.
#[derive(Default, Clone, Copy)]
pub struct ConvertContext<'a> {
    /// Job logger receiving command lines, tool output, and progress.
    pub logger: Option<&'a JobLogger>,
    /// Cancellation flag for the run.
    pub cancel: Option<&'a CancelFlag>,
    /// Progress callback, in addition to logger progress lines.
    pub on_progress: Option<&'a (dyn Fn(&Progress) + Send + Sync)>,
}
