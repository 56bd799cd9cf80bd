//! MuXolotl Core - FFmpeg orchestration backend.
//!
//! This crate contains all conversion logic with zero UI dependencies.
//! It wraps the external `ffmpeg`/`ffprobe` binaries and provides:
//!
//! - Command construction and progress-reporting execution ([`ffmpeg`])
//! - Capability and GPU detection with encoder fallback ([`detect`])
//! - Audio and video conversion policies ([`convert`])
//! - A persistent batch queue with a background worker ([`jobs`])

pub mod config;
pub mod convert;
pub mod detect;
pub mod ffmpeg;
pub mod jobs;
pub mod logging;
pub mod models;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_returns_value() {
        assert!(!version().is_empty());
    }
}
