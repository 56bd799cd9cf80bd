//! Sequential queue processing.
//!
//! `QueueProcessor` runs jobs one at a time, giving each its own log
//! file and checking the cancel flag between jobs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::convert::{AudioConverter, ConvertContext, VideoConverter};
use crate::detect::Capabilities;
use crate::ffmpeg::{CancelFlag, Progress};
use crate::config::Settings;
use crate::logging::{JobLogger, LogCallback, LogConfig, LogLevel};

use super::types::{JobKind, QueueEntry};

/// Outcome of a single processed job.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_id: String,
    pub name: String,
    pub success: bool,
    pub cancelled: bool,
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
    pub elapsed_secs: f64,
}

impl JobResult {
    pub fn success(entry: &QueueEntry, output: PathBuf, elapsed_secs: f64) -> Self {
        Self {
            job_id: entry.id.clone(),
            name: entry.name.clone(),
            success: true,
            cancelled: false,
            output_path: Some(output),
            error: None,
            elapsed_secs,
        }
    }

    pub fn failure(entry: &QueueEntry, error: impl Into<String>, elapsed_secs: f64) -> Self {
        Self {
            job_id: entry.id.clone(),
            name: entry.name.clone(),
            success: false,
            cancelled: false,
            output_path: None,
            error: Some(error.into()),
            elapsed_secs,
        }
    }

    pub fn cancelled(entry: &QueueEntry, elapsed_secs: f64) -> Self {
        Self {
            job_id: entry.id.clone(),
            name: entry.name.clone(),
            success: false,
            cancelled: true,
            output_path: None,
            error: None,
            elapsed_secs,
        }
    }
}

/// Runs queued jobs sequentially against a shared FFmpeg toolchain.
pub struct QueueProcessor {
    settings: Settings,
    log_dir: PathBuf,
    output_dir: PathBuf,
    video: VideoConverter,
    audio: AudioConverter,
}

impl QueueProcessor {
    pub fn new(
        settings: Settings,
        caps: Arc<Capabilities>,
        log_dir: PathBuf,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            settings,
            log_dir,
            output_dir,
            video: VideoConverter::new(caps.clone()),
            audio: AudioConverter::new(caps),
        }
    }

    fn log_config(&self) -> LogConfig {
        LogConfig {
            level: LogLevel::Info,
            compact: self.settings.logging.compact,
            progress_step: self.settings.logging.progress_step,
            error_tail: self.settings.logging.error_tail as usize,
            show_timestamps: self.settings.logging.show_timestamps,
        }
    }

    /// Run one job, writing its log under the processor's log dir.
    ///
    /// `log_callback` mirrors log lines to the caller; `on_progress`
    /// receives progress snapshots from the FFmpeg run.
    pub fn process_job(
        &self,
        entry: &QueueEntry,
        log_callback: Option<LogCallback>,
        cancel: Option<&CancelFlag>,
        on_progress: Option<&(dyn Fn(&Progress) + Send + Sync)>,
    ) -> JobResult {
        let started = Instant::now();

        let logger = match JobLogger::new(&entry.name, &self.log_dir, self.log_config(), log_callback)
        {
            Ok(logger) => logger,
            Err(e) => {
                tracing::error!(job = %entry.name, error = %e, "Failed to create job log");
                return JobResult::failure(entry, format!("Failed to create job log: {e}"), 0.0);
            }
        };

        logger.phase(&format!("Job: {}", entry.name));
        logger.info(&format!("Input: {}", entry.spec.input.display()));

        let output_dir = entry
            .spec
            .output_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.clone());

        let ctx = ConvertContext {
            logger: Some(&logger),
            cancel,
            on_progress,
        };

        let outcome = match &entry.spec.kind {
            JobKind::Video(opts) => self.video.convert(&entry.spec.input, &output_dir, opts, ctx),
            JobKind::Audio(opts) => self.audio.convert(&entry.spec.input, &output_dir, opts, ctx),
            JobKind::ExtractAudio(opts) => {
                self.video
                    .extract_audio(&entry.spec.input, &output_dir, opts, ctx)
            }
        };

        let elapsed = started.elapsed().as_secs_f64();

        match outcome {
            Ok(output) => {
                logger.success(&format!(
                    "Finished in {elapsed:.1}s -> {}",
                    output.display()
                ));
                JobResult::success(entry, output, elapsed)
            }
            Err(e) if e.is_cancelled() => {
                logger.warn("Job cancelled");
                JobResult::cancelled(entry, elapsed)
            }
            Err(e) => {
                logger.error(&format!("Job failed: {e}"));
                JobResult::failure(entry, e.to_string(), elapsed)
            }
        }
    }

    /// Run the given jobs in order, stopping early if cancelled.
    ///
    /// Jobs that never started because of cancellation get a cancelled
    /// result with zero elapsed time.
    pub fn process_queue(
        &self,
        entries: &[QueueEntry],
        cancel: Option<&CancelFlag>,
        mut on_result: impl FnMut(&JobResult),
    ) -> Vec<JobResult> {
        let mut results = Vec::with_capacity(entries.len());

        for entry in entries {
            if cancel.is_some_and(CancelFlag::is_cancelled) {
                tracing::info!(job = %entry.name, "Queue cancelled, skipping remaining jobs");
                let result = JobResult::cancelled(entry, 0.0);
                on_result(&result);
                results.push(result);
                continue;
            }

            tracing::info!(job = %entry.name, "Processing job");
            let result = self.process_job(entry, None, cancel, None);
            on_result(&result);
            results.push(result);
        }

        results
    }

    pub fn output_dir(&self) -> &PathBuf {
        &self.output_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::AudioConvertOptions;
    use crate::jobs::types::JobSpec;

    fn entry() -> QueueEntry {
        QueueEntry::new(JobSpec {
            input: PathBuf::from("/media/song.wav"),
            output_dir: None,
            kind: JobKind::Audio(AudioConvertOptions::default()),
        })
    }

    #[test]
    fn result_constructors() {
        let job = entry();

        let ok = JobResult::success(&job, PathBuf::from("/out/song.mp3"), 2.5);
        assert!(ok.success);
        assert!(!ok.cancelled);
        assert_eq!(ok.output_path, Some(PathBuf::from("/out/song.mp3")));
        assert!(ok.error.is_none());

        let err = JobResult::failure(&job, "encoder missing", 0.1);
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("encoder missing"));

        let stopped = JobResult::cancelled(&job, 0.0);
        assert!(!stopped.success);
        assert!(stopped.cancelled);
        assert!(stopped.error.is_none());
    }

    #[test]
    fn log_config_carries_logging_settings() {
        let mut settings = Settings::default();
        settings.logging.compact = false;
        settings.logging.progress_step = 10;
        settings.logging.error_tail = 7;

        let caps = Arc::new(Capabilities::new(crate::ffmpeg::Toolchain::with_paths(
            PathBuf::from("/nonexistent/ffmpeg"),
            None,
        )));
        let processor = QueueProcessor::new(
            settings,
            caps,
            PathBuf::from("/tmp/logs"),
            PathBuf::from("/tmp/out"),
        );

        let config = processor.log_config();
        assert!(!config.compact);
        assert_eq!(config.progress_step, 10);
        assert_eq!(config.error_tail, 7);
    }

    #[test]
    fn failed_job_does_not_block_later_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let caps = Arc::new(Capabilities::new(crate::ffmpeg::Toolchain::with_paths(
            PathBuf::from("/nonexistent/ffmpeg"),
            None,
        )));
        let processor = QueueProcessor::new(
            Settings::default(),
            caps,
            dir.path().join("logs"),
            dir.path().join("out"),
        );

        let jobs = vec![entry(), entry()];
        let mut seen = Vec::new();
        let results = processor.process_queue(&jobs, None, |r| seen.push(r.job_id.clone()));

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.success && !r.cancelled));
        assert!(results.iter().all(|r| r.error.is_some()));
        // Both jobs ran, in queue order
        assert_eq!(seen, vec![jobs[0].id.clone(), jobs[1].id.clone()]);
    }

    #[test]
    fn cancelled_queue_skips_all_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let caps = Arc::new(Capabilities::new(crate::ffmpeg::Toolchain::with_paths(
            PathBuf::from("/nonexistent/ffmpeg"),
            None,
        )));
        let processor = QueueProcessor::new(
            Settings::default(),
            caps,
            dir.path().join("logs"),
            dir.path().join("out"),
        );

        let cancel = CancelFlag::new();
        cancel.cancel();

        let jobs = vec![entry(), entry()];
        let results = processor.process_queue(&jobs, Some(&cancel), |_| {});

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.cancelled));
    }
}
