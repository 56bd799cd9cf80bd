use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use mux_core::models::{AudioQuality, CodecChoice, HwaccelChoice, SpeedProfile};

#[derive(Debug, Parser)]
#[command(name = "muxolotl")]
#[command(about = "FFmpeg-based audio and video converter")]
#[command(version = mux_core::version())]
pub struct Cli {
    /// Config file path (defaults to the platform config directory).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect a media file with ffprobe.
    Probe {
        /// File to inspect.
        input: PathBuf,

        /// Print raw JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Convert video files.
    Video {
        /// Input files.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        opts: VideoArgs,
    },

    /// Convert audio files.
    Audio {
        /// Input files.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        opts: AudioArgs,
    },

    /// Extract the audio track from video files.
    ExtractAudio {
        /// Input video files.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        opts: AudioArgs,
    },

    /// Manage the persistent job queue.
    #[command(subcommand)]
    Queue(QueueCommand),

    /// Show detected FFmpeg capabilities and GPU hardware.
    Caps {
        /// Also run one-frame test encodes against hardware encoders.
        #[arg(long)]
        test_encoders: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum QueueCommand {
    /// Add video conversion jobs to the queue.
    AddVideo {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        opts: VideoArgs,
    },

    /// Add audio conversion jobs to the queue.
    AddAudio {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        opts: AudioArgs,
    },

    /// List queued jobs.
    List,

    /// Run all pending jobs.
    Run,

    /// Remove finished jobs from the queue.
    ClearFinished,

    /// Remove all jobs from the queue.
    Clear,
}

#[derive(Debug, Args)]
pub struct VideoArgs {
    /// Output container format (mp4, mkv, webm, ...).
    #[arg(short, long)]
    pub format: Option<String>,

    /// Output directory.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Video codec: auto, copy, or an encoder name.
    #[arg(long, default_value = "auto")]
    pub video_codec: CodecChoice,

    /// Audio codec: auto, copy, or an encoder name.
    #[arg(long, default_value = "auto")]
    pub audio_codec: CodecChoice,

    /// Speed/quality profile: ultrafast, fast, balanced, high.
    #[arg(long, default_value = "balanced")]
    pub profile: SpeedProfile,

    /// CRF override (0-51, lower is better).
    #[arg(long)]
    pub crf: Option<u32>,

    /// Encoder preset override.
    #[arg(long)]
    pub preset: Option<String>,

    /// Video bitrate (e.g. 5M). Overrides quality-based encoding.
    #[arg(long)]
    pub video_bitrate: Option<String>,

    /// Audio bitrate.
    #[arg(long, default_value = "192k")]
    pub audio_bitrate: String,

    /// Output resolution (e.g. 1920x1080).
    #[arg(long)]
    pub resolution: Option<String>,

    /// Output framerate.
    #[arg(long)]
    pub fps: Option<u32>,

    /// Hardware decode acceleration: auto, none, or a method name.
    #[arg(long, default_value = "auto")]
    pub hwaccel: HwaccelChoice,

    /// Strip input metadata from the output.
    #[arg(long)]
    pub no_metadata: bool,

    /// Encoder thread count.
    #[arg(long)]
    pub threads: Option<u32>,
}

#[derive(Debug, Args)]
pub struct AudioArgs {
    /// Output format (mp3, flac, ogg, ...).
    #[arg(short, long)]
    pub format: Option<String>,

    /// Output directory.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Codec: auto, copy, or an encoder name.
    #[arg(long, default_value = "auto")]
    pub codec: CodecChoice,

    /// Bitrate (e.g. 192k).
    #[arg(short, long)]
    pub bitrate: Option<String>,

    /// Sample rate in Hz.
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Channel count.
    #[arg(long)]
    pub channels: Option<u8>,

    /// VBR quality tier: highest, high, medium, low.
    #[arg(short, long)]
    pub quality: Option<AudioQuality>,

    /// Strip input metadata from the output.
    #[arg(long)]
    pub no_metadata: bool,
}
