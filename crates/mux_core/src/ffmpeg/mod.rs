//! FFmpeg integration: command construction, execution, and probing.
//!
//! The [`Toolchain`] holds resolved binary paths and is the entry point
//! for running conversions and probing files. Command construction is a
//! pure function over [`EncodeParams`] so it can be tested without
//! FFmpeg installed.

mod command;
mod probe;
mod runner;

pub use command::{bitstream_filter, build_command, EncodeParams};
pub use probe::{MediaInfo, ProbeError, ProbeResult, StreamInfo};
pub use runner::{
    render_command, CancelFlag, FfmpegError, FfmpegResult, Progress, QuietRun, RunOptions,
    Toolchain,
};
