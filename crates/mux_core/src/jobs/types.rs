//! Job specification and status types.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::convert::{AudioConvertOptions, VideoConvertOptions};
use crate::models::ConversionMode;

/// What a job should do with its input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum JobKind {
    /// Convert a video file.
    Video(VideoConvertOptions),
    /// Convert an audio file.
    Audio(AudioConvertOptions),
    /// Extract the audio track from a video file.
    ExtractAudio(AudioConvertOptions),
}

impl JobKind {
    /// The conversion mode this kind maps to.
    pub fn mode(&self) -> ConversionMode {
        match self {
            JobKind::Video(_) => ConversionMode::Video,
            JobKind::Audio(_) => ConversionMode::Audio,
            JobKind::ExtractAudio(_) => ConversionMode::ExtractAudio,
        }
    }

    /// Target format extension for this job.
    pub fn format(&self) -> &str {
        match self {
            JobKind::Video(opts) => &opts.format,
            JobKind::Audio(opts) | JobKind::ExtractAudio(opts) => &opts.format,
        }
    }
}

/// A single conversion job: input file, destination, and options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    /// Input file path.
    pub input: PathBuf,
    /// Destination directory. `None` uses the configured output dir.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Conversion to perform.
    pub kind: JobKind,
}

/// Lifecycle state of a queued job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting to be processed.
    #[default]
    Pending,
    /// Currently running.
    Running,
    /// Finished successfully.
    Done {
        output: PathBuf,
        elapsed_secs: f64,
    },
    /// Finished with an error.
    Failed { error: String },
    /// Cancelled before completion.
    Cancelled,
}

impl JobStatus {
    /// Short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Done { .. } => "done",
            JobStatus::Failed { .. } => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the job has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            JobStatus::Done { .. } | JobStatus::Failed { .. } | JobStatus::Cancelled
        )
    }
}

/// A job in the queue, with identity and status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Unique job ID.
    pub id: String,
    /// Display name (input filename).
    pub name: String,
    /// What to do.
    pub spec: JobSpec,
    /// Current lifecycle state.
    #[serde(default)]
    pub status: JobStatus,
}

impl QueueEntry {
    /// Create a pending entry for a spec, naming it after the input file.
    pub fn new(spec: JobSpec) -> Self {
        let name = spec
            .input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| spec.input.to_string_lossy().into_owned());

        Self {
            id: new_job_id(),
            name,
            spec,
            status: JobStatus::Pending,
        }
    }
}

/// Generate a unique job ID from the clock plus a process-wide counter.
fn new_job_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!(
        "job-{}-{}",
        chrono::Local::now().format("%Y%m%d%H%M%S"),
        seq
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_spec(input: &str) -> JobSpec {
        JobSpec {
            input: PathBuf::from(input),
            output_dir: None,
            kind: JobKind::Video(VideoConvertOptions::default()),
        }
    }

    #[test]
    fn entry_named_after_input() {
        let entry = QueueEntry::new(video_spec("/media/holiday.mkv"));
        assert_eq!(entry.name, "holiday.mkv");
        assert_eq!(entry.status, JobStatus::Pending);
    }

    #[test]
    fn job_ids_are_unique() {
        let a = QueueEntry::new(video_spec("/a.mkv"));
        let b = QueueEntry::new(video_spec("/a.mkv"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn status_terminal_states() {
        assert!(!JobStatus::Pending.is_finished());
        assert!(!JobStatus::Running.is_finished());
        assert!(JobStatus::Cancelled.is_finished());
        assert!(JobStatus::Failed {
            error: "boom".to_string()
        }
        .is_finished());
        assert!(JobStatus::Done {
            output: PathBuf::from("/out/a.mp4"),
            elapsed_secs: 1.5
        }
        .is_finished());
    }

    #[test]
    fn spec_round_trips_through_json() {
        let spec = JobSpec {
            input: PathBuf::from("/media/in.wav"),
            output_dir: Some(PathBuf::from("/out")),
            kind: JobKind::Audio(AudioConvertOptions {
                format: "flac".to_string(),
                ..Default::default()
            }),
        };

        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("\"mode\":\"audio\""));

        let parsed: JobSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.input, spec.input);
        match parsed.kind {
            JobKind::Audio(opts) => assert_eq!(opts.format, "flac"),
            _ => panic!("wrong kind"),
        }
    }
}
